//! Service catalog — the service types tenants can deploy.
//!
//! Each [`ServiceTemplate`] fixes the container image, exposed port,
//! category, data mount path, monthly price and (for database engines)
//! the backup engine. [`BundleTemplate`]s describe composite offerings
//! whose members are provisioned together as one group.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Mount path for storage on types without a dedicated data directory.
pub const DEFAULT_DATA_PATH: &str = "/data";

/// Price charged for types missing from the price table.
pub const DEFAULT_MONTHLY_PRICE: f64 = 5.0;

/// Service type used for caller-supplied images.
pub const CUSTOM: &str = "custom";

/// Dashboard grouping of a service type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    App,
    #[serde(rename = "db")]
    Database,
    Cache,
    Monitoring,
    Other,
}

/// Database engines with a known dump/restore procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupEngine {
    Postgres,
    Mysql,
    Mongo,
}

/// Whether a one-shot job dumps or loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupAction {
    Backup,
    Restore,
}

impl BackupAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::Restore => "restore",
        }
    }
}

/// Directory inside backup jobs where the backup claim is mounted.
pub const BACKUP_MOUNT_PATH: &str = "/backups";

impl BackupEngine {
    /// File extension of dumps produced by this engine.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Postgres | Self::Mysql => "sql",
            Self::Mongo => "archive",
        }
    }

    /// Workload environment variable holding the admin password, if any.
    pub fn password_source_env(self) -> Option<&'static str> {
        match self {
            Self::Postgres => Some("POSTGRES_PASSWORD"),
            Self::Mysql => Some("MYSQL_ROOT_PASSWORD"),
            Self::Mongo => None,
        }
    }

    /// Environment variable the client tools read the password from.
    pub fn password_job_env(self) -> Option<&'static str> {
        match self {
            Self::Postgres => Some("PGPASSWORD"),
            Self::Mysql => Some("MYSQL_PWD"),
            Self::Mongo => None,
        }
    }

    /// Shell script run by a backup or restore job.
    ///
    /// `file` is a path relative to [`BACKUP_MOUNT_PATH`]; it may contain
    /// shell substitutions (scheduled jobs stamp the date at run time).
    pub fn script(self, action: BackupAction, host: &str, file: &str) -> String {
        let path = format!("{BACKUP_MOUNT_PATH}/{file}");
        match (self, action) {
            (Self::Postgres, BackupAction::Backup) => {
                format!("pg_dump -h {host} -U postgres -d postgres -f \"{path}\"")
            }
            (Self::Postgres, BackupAction::Restore) => {
                format!("psql -h {host} -U postgres -d postgres -f \"{path}\"")
            }
            (Self::Mysql, BackupAction::Backup) => {
                format!("mysqldump -h {host} -u root --all-databases --result-file=\"{path}\"")
            }
            (Self::Mysql, BackupAction::Restore) => {
                format!("mysql -h {host} -u root < \"{path}\"")
            }
            (Self::Mongo, BackupAction::Backup) => {
                format!("mongodump --host {host} --archive=\"{path}\"")
            }
            (Self::Mongo, BackupAction::Restore) => {
                format!("mongorestore --host {host} --drop --archive=\"{path}\"")
            }
        }
    }
}

/// One deployable service type.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceTemplate {
    pub service_type: &'static str,
    pub display_name: &'static str,
    pub image: &'static str,
    pub port: u16,
    /// Fixed environment.
    pub env: &'static [(&'static str, &'static str)],
    /// Environment variables that receive the group's generated password.
    pub secret_env: &'static [&'static str],
    pub category: Category,
    pub data_path: &'static str,
    pub monthly_price: f64,
    pub backup: Option<BackupEngine>,
    /// Whether an external route is published when a domain is configured.
    pub public: bool,
}

/// One member of a composite offering.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleMember {
    pub role: &'static str,
    pub service_type: &'static str,
    /// `(env var, role)`: the variable is set to the exposure name of
    /// the member with that role.
    pub links: &'static [(&'static str, &'static str)],
}

/// A composite offering provisioned as one group.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleTemplate {
    pub name: &'static str,
    pub display_name: &'static str,
    pub members: &'static [BundleMember],
}

/// What a requested service type expands to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Offering<'a> {
    Single(&'a ServiceTemplate),
    Bundle(&'a BundleTemplate),
}

const TEMPLATES: &[ServiceTemplate] = &[
    ServiceTemplate {
        service_type: "nginx",
        display_name: "Nginx Web Server",
        image: "nginx:latest",
        port: 80,
        env: &[],
        secret_env: &[],
        category: Category::App,
        data_path: "/usr/share/nginx/html",
        monthly_price: 5.0,
        backup: None,
        public: true,
    },
    ServiceTemplate {
        service_type: "postgres",
        display_name: "PostgreSQL Database",
        image: "postgres:16",
        port: 5432,
        env: &[("PGDATA", "/var/lib/postgresql/data/pgdata")],
        secret_env: &["POSTGRES_PASSWORD"],
        category: Category::Database,
        data_path: "/var/lib/postgresql/data",
        monthly_price: 15.0,
        backup: Some(BackupEngine::Postgres),
        public: false,
    },
    ServiceTemplate {
        service_type: "mysql",
        display_name: "MySQL Database",
        image: "mysql:8",
        port: 3306,
        env: &[("MYSQL_DATABASE", "app")],
        secret_env: &["MYSQL_ROOT_PASSWORD"],
        category: Category::Database,
        data_path: "/var/lib/mysql",
        monthly_price: 15.0,
        backup: Some(BackupEngine::Mysql),
        public: false,
    },
    ServiceTemplate {
        service_type: "mariadb",
        display_name: "MariaDB Database",
        image: "mariadb:11",
        port: 3306,
        env: &[("MARIADB_DATABASE", "app")],
        secret_env: &["MYSQL_ROOT_PASSWORD"],
        category: Category::Database,
        data_path: "/var/lib/mysql",
        monthly_price: 15.0,
        backup: Some(BackupEngine::Mysql),
        public: false,
    },
    ServiceTemplate {
        service_type: "mongodb",
        display_name: "MongoDB Database",
        image: "mongo:7",
        port: 27017,
        env: &[],
        secret_env: &[],
        category: Category::Database,
        data_path: "/data/db",
        monthly_price: 15.0,
        backup: Some(BackupEngine::Mongo),
        public: false,
    },
    ServiceTemplate {
        service_type: "redis",
        display_name: "Redis Cache",
        image: "redis:7",
        port: 6379,
        env: &[],
        secret_env: &[],
        category: Category::Cache,
        data_path: "/data",
        monthly_price: 10.0,
        backup: None,
        public: false,
    },
    ServiceTemplate {
        service_type: "grafana",
        display_name: "Grafana Dashboards",
        image: "grafana/grafana:latest",
        port: 3000,
        env: &[],
        secret_env: &["GF_SECURITY_ADMIN_PASSWORD"],
        category: Category::Monitoring,
        data_path: "/var/lib/grafana",
        monthly_price: 8.0,
        backup: None,
        public: true,
    },
    ServiceTemplate {
        service_type: "wordpress",
        display_name: "WordPress Site",
        image: "wordpress:latest",
        port: 80,
        env: &[("WORDPRESS_DB_USER", "root"), ("WORDPRESS_DB_NAME", "app")],
        secret_env: &["WORDPRESS_DB_PASSWORD"],
        category: Category::App,
        data_path: "/var/www/html",
        monthly_price: 10.0,
        backup: None,
        public: true,
    },
    ServiceTemplate {
        service_type: CUSTOM,
        display_name: "Custom Container",
        image: "",
        port: 80,
        env: &[],
        secret_env: &[],
        category: Category::Other,
        data_path: DEFAULT_DATA_PATH,
        monthly_price: 8.0,
        backup: None,
        public: true,
    },
];

const BUNDLES: &[BundleTemplate] = &[BundleTemplate {
    name: "wordpress-stack",
    display_name: "WordPress with MySQL",
    members: &[
        BundleMember {
            role: "database",
            service_type: "mysql",
            links: &[],
        },
        BundleMember {
            role: "app",
            service_type: "wordpress",
            links: &[("WORDPRESS_DB_HOST", "database")],
        },
    ],
}];

/// Look up a service template by type.
pub fn template(service_type: &str) -> Option<&'static ServiceTemplate> {
    TEMPLATES.iter().find(|t| t.service_type == service_type)
}

/// Look up a bundle by name.
pub fn bundle(name: &str) -> Option<&'static BundleTemplate> {
    BUNDLES.iter().find(|b| b.name == name)
}

/// Resolve a requested type to a single service or a bundle.
pub fn offering(name: &str) -> Option<Offering<'static>> {
    bundle(name)
        .map(Offering::Bundle)
        .or_else(|| template(name).map(Offering::Single))
}

/// All single-service templates.
pub fn templates() -> &'static [ServiceTemplate] {
    TEMPLATES
}

/// All bundles.
pub fn bundles() -> &'static [BundleTemplate] {
    BUNDLES
}

/// Where storage is mounted for a service type.
pub fn data_path(service_type: &str) -> &'static str {
    template(service_type)
        .map(|t| t.data_path)
        .unwrap_or(DEFAULT_DATA_PATH)
}

/// Dashboard category of a service type.
pub fn category(service_type: &str) -> Category {
    template(service_type)
        .map(|t| t.category)
        .unwrap_or(Category::Other)
}

/// Backup engine of a service type, if it is a supported database.
pub fn backup_engine(service_type: &str) -> Option<BackupEngine> {
    template(service_type).and_then(|t| t.backup)
}

/// Monthly price per service type, with overrides and a fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    prices: HashMap<String, f64>,
    default: f64,
}

impl PriceTable {
    /// Catalog prices with `overrides` applied on top.
    pub fn new(overrides: &HashMap<String, f64>, default: f64) -> Self {
        let mut prices: HashMap<String, f64> = TEMPLATES
            .iter()
            .map(|t| (t.service_type.to_string(), t.monthly_price))
            .collect();
        prices.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        Self { prices, default }
    }

    /// Monthly price of one running workload of this type.
    pub fn monthly(&self, service_type: &str) -> f64 {
        self.prices
            .get(service_type)
            .copied()
            .unwrap_or(self.default)
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::new(&HashMap::new(), DEFAULT_MONTHLY_PRICE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_members_reference_known_templates() {
        for bundle in bundles() {
            for member in bundle.members {
                assert!(template(member.service_type).is_some(), "{}", member.service_type);
                for (_, role) in member.links {
                    assert!(bundle.members.iter().any(|m| m.role == *role));
                }
            }
        }
    }

    #[test]
    fn offering_prefers_bundles() {
        assert!(matches!(offering("wordpress-stack"), Some(Offering::Bundle(_))));
        assert!(matches!(offering("nginx"), Some(Offering::Single(_))));
        assert!(offering("cobol").is_none());
    }

    #[test]
    fn data_paths_follow_engine() {
        assert_eq!(data_path("postgres"), "/var/lib/postgresql/data");
        assert_eq!(data_path("mysql"), "/var/lib/mysql");
        assert_eq!(data_path("custom"), DEFAULT_DATA_PATH);
        assert_eq!(data_path("unheard-of"), DEFAULT_DATA_PATH);
    }

    #[test]
    fn prices_use_catalog_overrides_and_default() {
        let table = PriceTable::default();
        assert_eq!(table.monthly("nginx"), 5.0);
        assert_eq!(table.monthly("postgres"), 15.0);
        assert_eq!(table.monthly("redis"), 10.0);
        assert_eq!(table.monthly("unheard-of"), DEFAULT_MONTHLY_PRICE);

        let overrides = HashMap::from([("nginx".to_string(), 7.5)]);
        let table = PriceTable::new(&overrides, 1.0);
        assert_eq!(table.monthly("nginx"), 7.5);
        assert_eq!(table.monthly("unheard-of"), 1.0);
    }

    #[test]
    fn only_databases_have_backup_engines() {
        assert_eq!(backup_engine("postgres"), Some(BackupEngine::Postgres));
        assert_eq!(backup_engine("mariadb"), Some(BackupEngine::Mysql));
        assert_eq!(backup_engine("nginx"), None);
        assert_eq!(backup_engine("redis"), None);
    }

    #[test]
    fn backup_scripts_target_the_mount() {
        let script = BackupEngine::Postgres.script(BackupAction::Backup, "pg-1-svc", "x.sql");
        assert_eq!(script, "pg_dump -h pg-1-svc -U postgres -d postgres -f \"/backups/x.sql\"");

        let script = BackupEngine::Mysql.script(BackupAction::Restore, "db-svc", "x.sql");
        assert!(script.ends_with("< \"/backups/x.sql\""));
    }
}
