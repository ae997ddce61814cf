//! Configuration for Postern

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PosternConfig {
    #[serde(default)]
    pub ldap: LdapConfigSection,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PosternConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::InternalError(format!("Failed to read config: {}", e)))?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `POSTERN_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("POSTERN_LDAP_HOST") {
            self.ldap.host = host;
        }
        if let Ok(port) = std::env::var("POSTERN_LDAP_PORT") {
            if let Ok(p) = port.parse() {
                self.ldap.port = p;
            }
        }
        if let Ok(dn) = std::env::var("POSTERN_LDAP_USERS_DN") {
            self.ldap.users_dn = dn;
        }
        if let Ok(dn) = std::env::var("POSTERN_LDAP_BIND_DN") {
            self.ldap.bind_dn = dn;
        }
        if let Ok(password) = std::env::var("POSTERN_LDAP_BIND_PASSWORD") {
            self.ldap.bind_password = password;
        }
        if let Ok(field) = std::env::var("POSTERN_LDAP_LOGIN_FIELD") {
            self.ldap.login_field = field;
        }
        if let Ok(field) = std::env::var("POSTERN_LDAP_EMAIL_FIELD") {
            self.ldap.email_field = field;
        }
        if let Ok(flag) = std::env::var("POSTERN_AUTOCREATE_MAIL_ACCOUNT") {
            self.mail.autocreate_mail_account_on_new_user_first_login =
                matches!(flag.as_str(), "1" | "true" | "yes");
        }
        if let Ok(login) = std::env::var("POSTERN_ADMIN_LOGIN") {
            self.auth.admin_login = login;
        }
        if let Ok(url) = std::env::var("POSTERN_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(level) = std::env::var("POSTERN_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.ldap.validate()?;

        if self.auth.admin_login.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "auth.admin_login must not be empty".into(),
            ));
        }
        if self.database.url.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "database.url must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// LDAP directory section
///
/// The login filter is built as `(login_field=<login>)` and searched in the
/// subtree rooted at `users_dn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfigSection {
    /// Directory host name or address
    #[serde(default = "default_ldap_host")]
    pub host: String,

    /// Directory port
    #[serde(default = "default_ldap_port")]
    pub port: u16,

    /// Base DN for user searches
    /// Example: "ou=people,dc=example,dc=com"
    #[serde(default)]
    pub users_dn: String,

    /// Service account DN used for the initial bind
    #[serde(default)]
    pub bind_dn: String,

    /// Service account password
    #[serde(default)]
    pub bind_password: String,

    /// Attribute matched against the submitted login
    #[serde(default = "default_login_field")]
    pub login_field: String,

    /// Attribute holding the user's email address
    #[serde(default = "default_email_field")]
    pub email_field: String,

    /// Upgrade the connection with STARTTLS
    #[serde(default)]
    pub start_tls: bool,

    /// Connection timeout in seconds
    #[serde(default = "default_ldap_timeout")]
    pub timeout_seconds: u64,
}

fn default_ldap_host() -> String {
    "127.0.0.1".to_string()
}

fn default_ldap_port() -> u16 {
    crate::DEFAULT_LDAP_PORT
}

fn default_login_field() -> String {
    "uid".to_string()
}

fn default_email_field() -> String {
    "mail".to_string()
}

fn default_ldap_timeout() -> u64 {
    10
}

impl Default for LdapConfigSection {
    fn default() -> Self {
        Self {
            host: default_ldap_host(),
            port: default_ldap_port(),
            users_dn: String::new(),
            bind_dn: String::new(),
            bind_password: String::new(),
            login_field: default_login_field(),
            email_field: default_email_field(),
            start_tls: false,
            timeout_seconds: default_ldap_timeout(),
        }
    }
}

impl LdapConfigSection {
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.is_empty() {
            return Err(crate::Error::InvalidConfig("ldap.host is required".into()));
        }
        if self.port == 0 {
            return Err(crate::Error::InvalidConfig("ldap.port must not be 0".into()));
        }
        if self.users_dn.is_empty() {
            return Err(crate::Error::InvalidConfig("ldap.users_dn is required".into()));
        }
        if self.login_field.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "ldap.login_field is required".into(),
            ));
        }
        Ok(())
    }
}

/// Mail module settings consulted by the login flow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailConfig {
    /// Provision a user and mail account on a first successful directory login
    #[serde(default)]
    pub autocreate_mail_account_on_new_user_first_login: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Reserved super-administrator login
    pub admin_login: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_login: "superadmin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://postern.db?mode=rwc".to_string(),
            max_connections: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
