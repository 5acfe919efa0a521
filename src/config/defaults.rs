use config::{ConfigBuilder, ConfigError, builder::DefaultState};

const DEFAULT_TOPOLOGY: &str = "ldap";
const DEFAULT_LDAP_MAPPING: &str = "default";
const DEFAULT_LDAP_URL: &str = "localhost:1636";
const DEFAULT_COUCHBASE_URL: &str = "localhost";
const DEFAULT_SECRET_BACKEND: &str = "consul";
const DEFAULT_CONSUL_URL: &str = "http://localhost:8500";
const DEFAULT_CONSUL_CONFIG_PREFIX: &str = "gluu/config/";
const DEFAULT_CONSUL_SECRET_PREFIX: &str = "gluu/secret/";
const DEFAULT_OPENBAO_URL: &str = "http://localhost:8200";
const DEFAULT_OPENBAO_KV_MOUNT: &str = "secret";
const DEFAULT_OPENBAO_SECRET_PREFIX: &str = "gluu/";
const DEFAULT_BACKEND_TIMEOUT: &str = "10s";
const DEFAULT_CERTS_DIR: &str = "/etc/certs";
const DEFAULT_CONF_DIR: &str = "/etc/gluu/conf";
const DEFAULT_IDP_DIR: &str = "/opt/shibboleth-idp";
const DEFAULT_TEMPLATES_DIR: &str = "/app/templates";
const DEFAULT_JETTY_WEBDEFAULT: &str = "/opt/jetty/etc/webdefault.xml";
const DEFAULT_JETTY_CONFIG: &str = "/opt/jetty/etc/jetty.xml";
const DEFAULT_KEYGEN_PROGRAM: &str = "java";
const DEFAULT_KEYGEN_CLASSPATH: &str = "/app/javalibs/idp3_cml_keygenerator.jar";
const DEFAULT_KEYGEN_MAIN_CLASS: &str = "org.gluu.oxshibboleth.keygenerator.KeyGenerator";
const DEFAULT_KEYGEN_TIMEOUT: &str = "120s";
const DEFAULT_KEYTOOL_PROGRAM: &str = "keytool";
const DEFAULT_KEYTOOL_TIMEOUT: &str = "60s";
const DEFAULT_COUCHBASE_USER: &str = "admin";
const DEFAULT_COUCHBASE_PASSWORD_FILE: &str = "/etc/gluu/conf/couchbase_password";
const DEFAULT_COUCHBASE_ADMIN_SCHEME: &str = "https";
const DEFAULT_COUCHBASE_ADMIN_PORT: u16 = 18091;
const DEFAULT_COUCHBASE_VERIFY_TLS: bool = false;
const DEFAULT_COUCHBASE_TIMEOUT: &str = "30s";
const DEFAULT_SEALER_WAIT_ATTEMPTS: u32 = 60;
const DEFAULT_SEALER_WAIT_INTERVAL: &str = "5s";
const DEFAULT_RETRY_BACKOFF_SECS: [u64; 3] = [2, 5, 10];
const DEFAULT_CIPHER_SCHEME: &str = "legacy";

pub(crate) fn apply_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("topology", DEFAULT_TOPOLOGY)?
        .set_default("ldap_mapping", DEFAULT_LDAP_MAPPING)?
        .set_default("ldap_url", DEFAULT_LDAP_URL)?
        .set_default("couchbase_url", DEFAULT_COUCHBASE_URL)?
        .set_default("secret_backend", DEFAULT_SECRET_BACKEND)?
        .set_default("consul.url", DEFAULT_CONSUL_URL)?
        .set_default("consul.config_prefix", DEFAULT_CONSUL_CONFIG_PREFIX)?
        .set_default("consul.secret_prefix", DEFAULT_CONSUL_SECRET_PREFIX)?
        .set_default("consul.timeout", DEFAULT_BACKEND_TIMEOUT)?
        .set_default("openbao.url", DEFAULT_OPENBAO_URL)?
        .set_default("openbao.kv_mount", DEFAULT_OPENBAO_KV_MOUNT)?
        .set_default("openbao.secret_prefix", DEFAULT_OPENBAO_SECRET_PREFIX)?
        .set_default("openbao.timeout", DEFAULT_BACKEND_TIMEOUT)?
        .set_default("paths.certs_dir", DEFAULT_CERTS_DIR)?
        .set_default("paths.conf_dir", DEFAULT_CONF_DIR)?
        .set_default("paths.idp_dir", DEFAULT_IDP_DIR)?
        .set_default("paths.templates_dir", DEFAULT_TEMPLATES_DIR)?
        .set_default("paths.jetty_webdefault", DEFAULT_JETTY_WEBDEFAULT)?
        .set_default("paths.jetty_config", DEFAULT_JETTY_CONFIG)?
        .set_default("keygen.program", DEFAULT_KEYGEN_PROGRAM)?
        .set_default("keygen.classpath", DEFAULT_KEYGEN_CLASSPATH)?
        .set_default("keygen.main_class", DEFAULT_KEYGEN_MAIN_CLASS)?
        .set_default("keygen.timeout", DEFAULT_KEYGEN_TIMEOUT)?
        .set_default("keytool.program", DEFAULT_KEYTOOL_PROGRAM)?
        .set_default("keytool.timeout", DEFAULT_KEYTOOL_TIMEOUT)?
        .set_default("couchbase.user", DEFAULT_COUCHBASE_USER)?
        .set_default("couchbase.password_file", DEFAULT_COUCHBASE_PASSWORD_FILE)?
        .set_default("couchbase.admin_scheme", DEFAULT_COUCHBASE_ADMIN_SCHEME)?
        .set_default("couchbase.admin_port", DEFAULT_COUCHBASE_ADMIN_PORT)?
        .set_default("couchbase.verify_tls", DEFAULT_COUCHBASE_VERIFY_TLS)?
        .set_default("couchbase.timeout", DEFAULT_COUCHBASE_TIMEOUT)?
        .set_default("sealer.wait_attempts", DEFAULT_SEALER_WAIT_ATTEMPTS)?
        .set_default("sealer.wait_interval", DEFAULT_SEALER_WAIT_INTERVAL)?
        .set_default("retry.backoff_secs", DEFAULT_RETRY_BACKOFF_SECS.to_vec())?
        .set_default("cipher.scheme", DEFAULT_CIPHER_SCHEME)
}
