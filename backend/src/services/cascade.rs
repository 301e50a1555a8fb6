//! Delete and restore cascades over the org tree.
//!
//! A plan lists every row a cascade touches. It is computed up front from
//! explicit store fetches and then applied by the store in one atomic step.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::department::Department;
use crate::models::unit::Unit;
use crate::models::user::User;
use crate::storage::{CascadeOp, CascadePlan, Store};

/// Which descendants a plan picks up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Rows not yet deleted (soft delete)
    Live,
    /// Rows deleted by the same cascade, identified by its stamp (restore)
    Stamped(DateTime<Utc>),
    /// Every row regardless of state (hard delete)
    All,
}

impl Selection {
    fn includes(self, deleted_on: Option<DateTime<Utc>>) -> bool {
        match self {
            Selection::Live => deleted_on.is_none(),
            Selection::Stamped(stamp) => deleted_on == Some(stamp),
            Selection::All => true,
        }
    }

    /// Selection matching a cascade operation. Restore needs the stamp of
    /// the entity being restored.
    pub fn for_op(op: CascadeOp, stamp: Option<DateTime<Utc>>) -> Self {
        match (op, stamp) {
            (CascadeOp::SoftDelete(_), _) => Selection::Live,
            (CascadeOp::Restore, Some(stamp)) => Selection::Stamped(stamp),
            (CascadeOp::Restore, None) => Selection::Live,
            (CascadeOp::HardDelete, _) => Selection::All,
        }
    }
}

pub async fn plan_department(
    store: &dyn Store,
    department: &Department,
    selection: Selection,
) -> Result<CascadePlan> {
    let mut plan = CascadePlan::default();
    plan.department_ids.push(department.id);
    for unit in store.units_of_department(department.id).await? {
        if selection.includes(unit.deleted_on) {
            add_unit(store, &unit, selection, &mut plan).await?;
        }
    }
    Ok(finish(plan))
}

pub async fn plan_unit(store: &dyn Store, unit: &Unit, selection: Selection) -> Result<CascadePlan> {
    let mut plan = CascadePlan::default();
    add_unit(store, unit, selection, &mut plan).await?;
    Ok(finish(plan))
}

pub async fn plan_user(store: &dyn Store, user: &User, selection: Selection) -> Result<CascadePlan> {
    let mut plan = CascadePlan::default();
    add_user(store, user, selection, &mut plan).await?;
    Ok(finish(plan))
}

async fn add_unit(
    store: &dyn Store,
    unit: &Unit,
    selection: Selection,
    plan: &mut CascadePlan,
) -> Result<()> {
    plan.unit_ids.push(unit.id);
    for grant in store.unit_users_of_unit(unit.id).await? {
        if selection.includes(grant.deleted_on) {
            plan.unit_user_keys.push(grant.key());
        }
    }
    for user in store.users_of_unit(unit.id).await? {
        if selection.includes(user.deleted_on) {
            add_user(store, &user, selection, plan).await?;
        }
    }
    Ok(())
}

async fn add_user(
    store: &dyn Store,
    user: &User,
    selection: Selection,
    plan: &mut CascadePlan,
) -> Result<()> {
    plan.user_ids.push(user.id);
    for grant in store.unit_users_of_user(user.id).await? {
        if selection.includes(grant.deleted_on) {
            plan.unit_user_keys.push(grant.key());
        }
    }
    if selection == Selection::All {
        for row in store.user_accesses_of_user(user.id).await? {
            plan.user_access_keys.push(row.key());
        }
    }
    Ok(())
}

fn finish(mut plan: CascadePlan) -> CascadePlan {
    plan.unit_user_keys.sort();
    plan.unit_user_keys.dedup();
    plan.user_access_keys.sort();
    plan.user_access_keys.dedup();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::unit::UnitUser;
    use crate::services::grant_service::apply_grant;
    use crate::services::test_support::Fixture;
    use chrono::Duration;

    #[tokio::test]
    async fn test_department_soft_delete_stamps_everything_and_removes_nothing() {
        let f = Fixture::new().await;
        let store = f.store.as_ref();
        let users_before = store.list_users().await.unwrap().len();
        let grants_before = store.list_unit_users().await.unwrap().len();

        let plan = plan_department(store, &f.hr, Selection::Live).await.unwrap();
        assert_eq!(plan.department_ids, vec![f.hr.id]);
        assert_eq!(plan.unit_ids, vec![f.payroll.id]);
        assert_eq!(plan.user_ids.len(), 3);
        assert_eq!(plan.unit_user_keys.len(), 2);
        assert!(plan.user_access_keys.is_empty());

        let at = Utc::now();
        store
            .apply_cascade(CascadeOp::SoftDelete(at), &plan)
            .await
            .unwrap();

        let hr = store.get_department(f.hr.id).await.unwrap().unwrap();
        assert_eq!(hr.deleted_on, Some(at));
        let payroll = store.get_unit(f.payroll.id).await.unwrap().unwrap();
        assert_eq!(payroll.deleted_on, Some(at));
        let anna = store.get_user(f.anna.id).await.unwrap().unwrap();
        assert_eq!(anna.deleted_on, Some(at));
        let clerk_grants = store.unit_users_of_user(f.clerk.id).await.unwrap();
        assert!(clerk_grants.iter().all(|g| g.deleted_on == Some(at)));

        assert_eq!(store.list_users().await.unwrap().len(), users_before);
        assert_eq!(store.list_unit_users().await.unwrap().len(), grants_before);
        let it = store.get_department(f.it.id).await.unwrap().unwrap();
        assert!(it.deleted_on.is_none());
    }

    #[tokio::test]
    async fn test_restore_only_picks_up_rows_with_matching_stamp() {
        let f = Fixture::new().await;
        let store = f.store.as_ref();

        let earlier = Utc::now() - Duration::days(3);
        let plan = plan_user(store, &f.anna, Selection::Live).await.unwrap();
        store
            .apply_cascade(CascadeOp::SoftDelete(earlier), &plan)
            .await
            .unwrap();

        let at = Utc::now();
        let plan = plan_department(store, &f.hr, Selection::Live).await.unwrap();
        assert!(!plan.user_ids.contains(&f.anna.id));
        store
            .apply_cascade(CascadeOp::SoftDelete(at), &plan)
            .await
            .unwrap();

        let hr = store.get_department(f.hr.id).await.unwrap().unwrap();
        let plan = plan_department(store, &hr, Selection::for_op(CascadeOp::Restore, hr.deleted_on))
            .await
            .unwrap();
        store.apply_cascade(CascadeOp::Restore, &plan).await.unwrap();

        let clerk = store.get_user(f.clerk.id).await.unwrap().unwrap();
        assert!(clerk.deleted_on.is_none());
        let anna = store.get_user(f.anna.id).await.unwrap().unwrap();
        assert_eq!(anna.deleted_on, Some(earlier));
    }

    #[tokio::test]
    async fn test_user_plan_covers_own_unit_grants() {
        let f = Fixture::new().await;
        let store = f.store.as_ref();
        store
            .upsert_unit_user(&UnitUser::new(f.helpdesk.id, f.clerk.id))
            .await
            .unwrap();
        let plan = plan_user(store, &f.clerk, Selection::Live).await.unwrap();
        assert_eq!(plan.user_ids, vec![f.clerk.id]);
        assert_eq!(plan.unit_user_keys.len(), 2);
        assert!(plan.unit_ids.is_empty());
    }

    #[tokio::test]
    async fn test_hard_delete_removes_grants_bottom_up() {
        let f = Fixture::new().await;
        let store = f.store.as_ref();
        let row = apply_grant(None, f.anna.id, f.hr_access.id, f.order_1.id, Utc::now());
        store
            .upsert_grant(row.user_id, row.access_id, row.granted_by_directive_id, row.granted_on)
            .await
            .unwrap();

        let plan = plan_unit(store, &f.payroll, Selection::All).await.unwrap();
        assert_eq!(plan.user_access_keys, vec![(f.anna.id, f.hr_access.id)]);
        store.apply_cascade(CascadeOp::HardDelete, &plan).await.unwrap();

        assert!(store.get_unit(f.payroll.id).await.unwrap().is_none());
        assert!(store.get_user(f.anna.id).await.unwrap().is_none());
        assert!(store.list_user_accesses().await.unwrap().is_empty());
        assert!(store.unit_users_of_unit(f.payroll.id).await.unwrap().is_empty());
        // the department itself is untouched by a unit cascade
        assert!(store.get_department(f.hr.id).await.unwrap().is_some());
        // the directive survives once nothing references it
        store.delete_directive(f.order_1.id).await.unwrap();
    }
}
