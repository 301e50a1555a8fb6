//! CSV reports.
//!
//! Every export is scoped by the caller's reading level, the same as the
//! lists the API returns. Header rows and authority labels follow the
//! requested display language.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::user::AuthorityLevel;
use crate::services::access_tree::AccessTree;
use crate::services::grant_service::GrantService;
use crate::services::visibility::{self, CallerContext, Capability};
use crate::storage::Store;

/// Display language for exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "bg")]
    Bulgarian,
}

/// Translatable column and value labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Username,
    FullName,
    Department,
    Unit,
    Position,
    Reading,
    Writing,
    InformationSystem,
    Access,
    GrantedBy,
    GrantedOn,
    RevokedBy,
    RevokedOn,
    UserCount,
}

impl Language {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "en" | "english" => Some(Language::English),
            "bg" | "bulgarian" => Some(Language::Bulgarian),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Bulgarian => "bg",
        }
    }

    fn label(self, label: Label) -> &'static str {
        use Label::*;
        match (self, label) {
            (Language::English, Username) => "Username",
            (Language::English, FullName) => "Full name",
            (Language::English, Department) => "Department",
            (Language::English, Unit) => "Unit",
            (Language::English, Position) => "Position",
            (Language::English, Reading) => "Reading access",
            (Language::English, Writing) => "Writing access",
            (Language::English, InformationSystem) => "Information system",
            (Language::English, Access) => "Access",
            (Language::English, GrantedBy) => "Granted by directive",
            (Language::English, GrantedOn) => "Granted on",
            (Language::English, RevokedBy) => "Revoked by directive",
            (Language::English, RevokedOn) => "Revoked on",
            (Language::English, UserCount) => "Users",
            (Language::Bulgarian, Username) => "Потребителско име",
            (Language::Bulgarian, FullName) => "Име",
            (Language::Bulgarian, Department) => "Отдел",
            (Language::Bulgarian, Unit) => "Звено",
            (Language::Bulgarian, Position) => "Длъжност",
            (Language::Bulgarian, Reading) => "Права за четене",
            (Language::Bulgarian, Writing) => "Права за писане",
            (Language::Bulgarian, InformationSystem) => "Информационна система",
            (Language::Bulgarian, Access) => "Достъп",
            (Language::Bulgarian, GrantedBy) => "Предоставен със заповед",
            (Language::Bulgarian, GrantedOn) => "Предоставен на",
            (Language::Bulgarian, RevokedBy) => "Отнет със заповед",
            (Language::Bulgarian, RevokedOn) => "Отнет на",
            (Language::Bulgarian, UserCount) => "Служители",
        }
    }

    fn header(self, labels: &[Label]) -> Vec<&'static str> {
        labels.iter().map(|l| self.label(*l)).collect()
    }

    pub fn authority(self, level: AuthorityLevel) -> &'static str {
        match (self, level) {
            (Language::English, AuthorityLevel::None) => "None",
            (Language::English, AuthorityLevel::Restricted) => "Restricted",
            (Language::English, AuthorityLevel::Full) => "Full",
            (Language::English, AuthorityLevel::SuperAdmin) => "Super admin",
            (Language::Bulgarian, AuthorityLevel::None) => "Няма",
            (Language::Bulgarian, AuthorityLevel::Restricted) => "Ограничен",
            (Language::Bulgarian, AuthorityLevel::Full) => "Пълен",
            (Language::Bulgarian, AuthorityLevel::SuperAdmin) => "Супер администратор",
        }
    }

    pub fn date(self, at: DateTime<Utc>) -> String {
        match self {
            Language::English => at.format("%Y-%m-%d").to_string(),
            Language::Bulgarian => at.format("%d.%m.%Y").to_string(),
        }
    }
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV flush failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV is not UTF-8: {}", e)))
}

/// Export service
#[derive(Clone)]
pub struct ExportService {
    store: Arc<dyn Store>,
    grants: GrantService,
}

impl ExportService {
    pub fn new(store: Arc<dyn Store>, grants: GrantService) -> Self {
        Self { store, grants }
    }

    /// Visible users with placement and authority levels
    pub async fn users_csv(&self, caller: &CallerContext, lang: Language) -> Result<String> {
        let units = self.store.list_units().await?;
        let users = visibility::accessible_users(
            caller,
            Capability::Read,
            &self.store.list_users().await?,
            &units,
        );
        let departments: HashMap<Uuid, String> = self
            .store
            .list_departments()
            .await?
            .into_iter()
            .map(|d| (d.id, d.description))
            .collect();
        let units: HashMap<Uuid, (String, Uuid)> = units
            .into_iter()
            .map(|u| (u.id, (u.description, u.department_id)))
            .collect();

        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(lang.header(&[
            Label::Username,
            Label::FullName,
            Label::Department,
            Label::Unit,
            Label::Position,
            Label::Reading,
            Label::Writing,
        ]))?;
        for user in &users {
            let (unit, department) = match units.get(&user.unit_id) {
                Some((unit, department_id)) => (
                    unit.as_str(),
                    departments.get(department_id).map(String::as_str).unwrap_or_default(),
                ),
                None => ("", ""),
            };
            wtr.write_record([
                user.username.as_str(),
                user.full_name().as_str(),
                department,
                unit,
                user.position.as_deref().unwrap_or_default(),
                lang.authority(user.reading_access),
                lang.authority(user.writing_access),
            ])?;
        }
        tracing::debug!(rows = users.len(), "Exported users");
        finish(wtr)
    }

    /// Grant rows of visible users; one user when `user_id` is given
    pub async fn grants_csv(
        &self,
        caller: &CallerContext,
        lang: Language,
        user_id: Option<Uuid>,
    ) -> Result<String> {
        if !visibility::can_see_accesses(caller) {
            return Err(AppError::Authorization(
                "A reading level is required to export grants".to_string(),
            ));
        }
        let units = self.store.list_units().await?;
        let users: Vec<_> = visibility::accessible_users(
            caller,
            Capability::Read,
            &self.store.list_users().await?,
            &units,
        )
        .into_iter()
        .filter(|u| user_id.map_or(true, |id| id == u.id))
        .collect();
        let rows = self.store.list_user_accesses().await?;
        let mut views = self.grants.enrich(rows, &users).await?;
        views.sort_by(|a, b| {
            a.username
                .cmp(&b.username)
                .then_with(|| a.information_system.cmp(&b.information_system))
                .then_with(|| a.access_path.cmp(&b.access_path))
        });

        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(lang.header(&[
            Label::Username,
            Label::InformationSystem,
            Label::Access,
            Label::GrantedBy,
            Label::GrantedOn,
            Label::RevokedBy,
            Label::RevokedOn,
        ]))?;
        for view in &views {
            wtr.write_record([
                view.username.as_str(),
                view.information_system.as_str(),
                view.access_path.as_str(),
                view.granted_by_directive.as_str(),
                lang.date(view.granted_on).as_str(),
                view.revoked_by_directive.as_deref().unwrap_or_default(),
                view.revoked_on
                    .map(|at| lang.date(at))
                    .unwrap_or_default()
                    .as_str(),
            ])?;
        }
        tracing::debug!(rows = views.len(), "Exported grants");
        finish(wtr)
    }

    /// Access trees printed depth-first, each level indented by one empty cell
    pub async fn access_tree_csv(
        &self,
        caller: &CallerContext,
        lang: Language,
        system_id: Option<Uuid>,
    ) -> Result<String> {
        if !visibility::can_see_accesses(caller) {
            return Err(AppError::Authorization(
                "A reading level is required to export the catalog".to_string(),
            ));
        }
        let tree = AccessTree::from_accesses(self.store.list_accesses().await?);
        let systems = self.store.list_information_systems().await?;

        let mut wtr = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        wtr.write_record(lang.header(&[Label::InformationSystem, Label::Access]))?;
        for system in systems
            .iter()
            .filter(|s| system_id.map_or(true, |id| id == s.id))
        {
            wtr.write_record([system.name.as_str()])?;
            for node in tree.depth_first(system.id) {
                let mut record = vec![""; node.depth + 1];
                record.push(node.access.description.as_str());
                wtr.write_record(&record)?;
            }
        }
        finish(wtr)
    }

    /// Visible departments and units with the number of visible users
    pub async fn org_chart_csv(&self, caller: &CallerContext, lang: Language) -> Result<String> {
        let units = self.store.list_units().await?;
        let departments = visibility::accessible_departments(
            caller,
            Capability::Read,
            &self.store.list_departments().await?,
            &units,
        );
        let visible_units = visibility::accessible_units(caller, Capability::Read, &units);
        let users =
            visibility::accessible_users(caller, Capability::Read, &self.store.list_users().await?, &units);
        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        for user in &users {
            *counts.entry(user.unit_id).or_default() += 1;
        }

        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(lang.header(&[Label::Department, Label::Unit, Label::UserCount]))?;
        for department in &departments {
            for unit in visible_units
                .iter()
                .filter(|u| u.department_id == department.id)
            {
                let count = counts.get(&unit.id).copied().unwrap_or(0).to_string();
                wtr.write_record([
                    department.description.as_str(),
                    unit.description.as_str(),
                    count.as_str(),
                ])?;
            }
        }
        finish(wtr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::audit_service::AuditService;
    use crate::services::test_support::Fixture;

    fn service(f: &Fixture) -> ExportService {
        let audit = AuditService::new(f.store.clone());
        ExportService::new(f.store.clone(), GrantService::new(f.store.clone(), audit))
    }

    #[test]
    fn test_language_parse() {
        assert_eq!(Language::parse("EN"), Some(Language::English));
        assert_eq!(Language::parse("bulgarian"), Some(Language::Bulgarian));
        assert_eq!(Language::parse("de"), None);
        assert_eq!(Language::Bulgarian.code(), "bg");
    }

    #[test]
    fn test_localized_labels_and_dates() {
        assert_eq!(Language::English.authority(AuthorityLevel::Full), "Full");
        assert_eq!(Language::Bulgarian.authority(AuthorityLevel::Full), "Пълен");
        let at = DateTime::parse_from_rfc3339("2024-03-05T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(Language::English.date(at), "2024-03-05");
        assert_eq!(Language::Bulgarian.date(at), "05.03.2024");
    }

    #[tokio::test]
    async fn test_users_csv_is_scoped() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let viewer = f.caller(&f.viewer).await;
        let csv = svc.users_csv(&viewer, Language::English).await.unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Username,Full name,Department,Unit,Position,Reading access,Writing access"
        );
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("anna,Anna Ivanova,HR,Payroll,"));
        assert!(!csv.contains("vera"));
    }

    #[tokio::test]
    async fn test_users_csv_in_bulgarian() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let admin = f.caller(&f.admin).await;
        let csv = svc.users_csv(&admin, Language::Bulgarian).await.unwrap();
        assert!(csv.starts_with("Потребителско име,Име,Отдел,Звено"));
        assert!(csv.contains("Супер администратор"));
    }

    #[tokio::test]
    async fn test_access_tree_csv_indents_by_depth() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let viewer = f.caller(&f.viewer).await;
        let csv = svc
            .access_tree_csv(&viewer, Language::English, None)
            .await
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec!["Information system,Access", "HRIS", ",HR", ",,Payroll"]
        );
    }

    #[tokio::test]
    async fn test_grants_csv() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let admin = f.caller(&f.admin).await;
        svc.grants
            .grant(&admin, f.anna.id, f.payroll_access.id, f.order_1.id)
            .await
            .unwrap();
        svc.grants
            .grant(&admin, f.vera.id, f.hr_access.id, f.order_1.id)
            .await
            .unwrap();
        svc.grants
            .revoke(&admin, f.vera.id, f.hr_access.id, f.order_2.id)
            .await
            .unwrap();

        let csv = svc.grants_csv(&admin, Language::English, None).await.unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("anna,HRIS,HR -> Payroll,Order 1/2024,"));
        assert!(lines[1].ends_with(",,"));
        assert!(lines[2].starts_with("vera,HRIS,HR,Order 1/2024,"));
        assert!(lines[2].contains("Order 2/2024"));

        let viewer = f.caller(&f.viewer).await;
        let scoped = svc.grants_csv(&viewer, Language::English, None).await.unwrap();
        assert_eq!(scoped.lines().count(), 2);

        let one = svc
            .grants_csv(&admin, Language::English, Some(f.vera.id))
            .await
            .unwrap();
        assert_eq!(one.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_org_chart_counts_visible_users() {
        let f = Fixture::new().await;
        let svc = service(&f);
        let admin = f.caller(&f.admin).await;
        let csv = svc.org_chart_csv(&admin, Language::English).await.unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["Department,Unit,Users", "HR,Payroll,3", "IT,Helpdesk,3"]);
    }
}
