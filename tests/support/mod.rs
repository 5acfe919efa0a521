// Helper functions are shared across multiple test crates; not every helper is
// referenced in each test module.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use idp_bootstrap::cipher::{self, CipherScheme};
use idp_bootstrap::config::Settings;
use idp_bootstrap::couchbase::{AdminError, UserAdmin};
use idp_bootstrap::manager::{ConfigManager, SecretManager};
use idp_bootstrap::pipeline::Pipeline;
use idp_bootstrap::store::MemoryStore;
use idp_bootstrap::topology::{Partition, Topology};
use rcgen::generate_simple_self_signed;
use tempfile::TempDir;

pub(crate) const SALT: &str = "abcdefghijklmnopqrstuvwx";
pub(crate) const CONFIG_PREFIX: &str = "gluu/config/";
pub(crate) const SECRET_PREFIX: &str = "gluu/secret/";
pub(crate) const LDAP_PASSWORD: &str = "ldap-password";
pub(crate) const HOSTNAME: &str = "idp.example.org";
/// Keystore bytes stored encrypted as-is, the way deployments hold them.
pub(crate) const IDP_JKS: [u8; 8] = [0xfe, 0xed, 0xfe, 0xed, 0, 0, 0, 2];
pub(crate) const LDAP_PKCS12: [u8; 7] = [0x30, 0x82, 0x0a, 0xff, 0xfe, 0x00, 0x9f];

pub(crate) const WEBDEFAULT_XML: &str = r"<web-app>
  <servlet>
    <init-param>
      <param-name>dirAllowed</param-name>
      <param-value>true</param-value>
    </init-param>
  </servlet>
</web-app>
";

pub(crate) const JETTY_XML: &str = r#"<Configure id="Server" class="org.eclipse.jetty.server.Server">
  <New id="httpConfig" class="org.eclipse.jetty.server.HttpConfiguration">
    <Set name="sendServerVersion"><Property name="jetty.httpConfig.sendServerVersion" deprecated="jetty.send.server.version" default="true" /></Set>
  </New>
  <Set name="handler">
    <New id="Handlers" class="org.eclipse.jetty.server.handler.HandlerCollection">
      <Set name="handlers">
        <Array type="org.eclipse.jetty.server.Handler">
          <Item><New id="DefaultHandler" class="org.eclipse.jetty.server.handler.DefaultHandler"/></Item>
        </Array>
      </Set>
    </New>
  </Set>
</Configure>
"#;

pub(crate) fn config_key(name: &str) -> String {
    format!("{CONFIG_PREFIX}{name}")
}

pub(crate) fn secret_key(name: &str) -> String {
    format!("{SECRET_PREFIX}{name}")
}

fn encrypt(plaintext: &[u8]) -> String {
    cipher::encrypt(plaintext, SALT, CipherScheme::Legacy).expect("encrypt fixture")
}

fn cert_and_key(name: &str) -> (String, String) {
    let rcgen::CertifiedKey { cert, signing_key } =
        generate_simple_self_signed(vec![name.to_string()]).expect("self signed");
    (cert.pem(), signing_key.serialize_pem())
}

/// Backend entries for a fully provisioned deployment.
pub(crate) fn provisioned_store(root: &Path) -> MemoryStore {
    let (signing_cert, signing_key) = cert_and_key("signing.idp.example.org");
    let (encryption_cert, encryption_key) = cert_and_key("encryption.idp.example.org");
    let (ssl_cert, ssl_key) = cert_and_key(HOSTNAME);
    let (ldap_cert, _) = cert_and_key("ldap.example.org");
    let (couchbase_cert, _) = cert_and_key("couchbase.example.org");


    let certs = root.join("certs");
    let config = [
        ("hostname", HOSTNAME.to_string()),
        ("orgName", "Example Org".to_string()),
        ("inumOrg", "@!1234.5678".to_string()),
        ("ldap_binddn", "cn=directory manager".to_string()),
        (
            "ldapTrustStoreFn",
            certs.join("opendj.pkcs12").display().to_string(),
        ),
        (
            "couchbaseTrustStoreFn",
            certs.join("couchbase.pkcs12").display().to_string(),
        ),
    ];
    let secrets = [
        ("encoded_salt", SALT.to_string()),
        ("shibJksPass", "jks-pass".to_string()),
        ("idp3SigningCertificateText", signing_cert),
        ("idp3SigningKeyText", signing_key),
        ("idp3EncryptionCertificateText", encryption_cert),
        ("idp3EncryptionKeyText", encryption_key),
        ("ssl_cert", ssl_cert),
        ("ssl_key", ssl_key),
        ("shibIDP_jks_base64", encrypt(&IDP_JKS)),
        ("encoded_ox_ldap_pw", encrypt(LDAP_PASSWORD.as_bytes())),
        ("encoded_ldapTrustStorePass", encrypt(b"ldap-truststore")),
        ("ldap_pkcs12_base64", encrypt(&LDAP_PKCS12)),
        ("ldap_ssl_cert", encrypt(ldap_cert.as_bytes())),
        ("encoded_couchbaseTrustStorePass", encrypt(b"cb-truststore")),
        ("couchbase_cert", couchbase_cert),
        ("couchbase_shib_user_password", "shib-user-pw".to_string()),
    ];

    MemoryStore::with_entries(
        config
            .into_iter()
            .map(|(name, value)| (config_key(name), value))
            .chain(
                secrets
                    .into_iter()
                    .map(|(name, value)| (secret_key(name), value)),
            ),
    )
}

fn write_script(path: &Path, script: &str) -> Result<()> {
    fs::write(path, script).with_context(|| format!("Failed to write {}", path.display()))?;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    Ok(())
}

/// Fake key generator: `-classpath <jar> <class> <certs dir> <password>`.
pub(crate) fn write_fake_keygen(bin: &Path) -> Result<PathBuf> {
    let calls = bin.join("keygen.calls");
    let script = format!(
        r#"#!/bin/sh
set -eu
echo run >> "{calls}"
sleep 0.2
head -c 64 /dev/urandom > "$4/sealer.jks"
printf 'v%s' "$(date +%s%N)" > "$4/sealer.kver"
"#,
        calls = calls.display()
    );
    let path = bin.join("keygen");
    write_script(&path, &script)?;
    Ok(path)
}

pub(crate) fn write_failing_keygen(bin: &Path) -> Result<PathBuf> {
    let path = bin.join("keygen-broken");
    write_script(
        &path,
        "#!/bin/sh\necho 'keystore password was incorrect' >&2\nexit 1\n",
    )?;
    Ok(path)
}

/// Fake keytool that creates whatever `-keystore` names.
pub(crate) fn write_fake_keytool(bin: &Path) -> Result<PathBuf> {
    let path = bin.join("keytool");
    write_script(
        &path,
        r#"#!/bin/sh
set -eu
keystore=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-keystore" ]; then
    keystore="$2"
  fi
  shift
done
printf 'pkcs12-truststore' > "$keystore"
"#,
    )?;
    Ok(path)
}

#[derive(Debug, Default)]
pub(crate) struct FakeAdmin {
    users: Mutex<Vec<String>>,
    calls: Mutex<usize>,
    fail_with_status: bool,
}

impl FakeAdmin {
    pub(crate) fn failing() -> Self {
        Self {
            fail_with_status: true,
            ..Self::default()
        }
    }

    pub(crate) fn users(&self) -> Vec<String> {
        self.users.lock().expect("users lock").clone()
    }

    pub(crate) fn calls(&self) -> usize {
        *self.calls.lock().expect("calls lock")
    }
}

#[async_trait]
impl UserAdmin for FakeAdmin {
    async fn create_user(
        &self,
        name: &str,
        _password: &str,
        _display_name: &str,
        roles: &str,
    ) -> Result<(), AdminError> {
        *self.calls.lock().expect("calls lock") += 1;
        if self.fail_with_status {
            return Err(AdminError::Status {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: "cluster warming up".to_string(),
            });
        }
        let mut users = self.users.lock().expect("users lock");
        if users.iter().any(|user| user.starts_with(&format!("{name}:"))) {
            return Err(AdminError::AlreadyExists(name.to_string()));
        }
        users.push(format!("{name}:{roles}"));
        Ok(())
    }
}

/// One replica's filesystem plus the backend it shares with others.
pub(crate) struct Fixture {
    pub(crate) dir: TempDir,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) admin: Arc<FakeAdmin>,
    pub(crate) settings: Settings,
}

impl Fixture {
    pub(crate) fn new(topology: Topology, ldap_mapping: Partition) -> Result<Self> {
        let dir = tempfile::tempdir().context("Failed to create fixture dir")?;
        let store = Arc::new(provisioned_store(dir.path()));
        Self::with_backend(dir, store, Arc::new(FakeAdmin::default()), topology, ldap_mapping)
    }

    /// A second replica sharing this fixture's backend and admin API.
    pub(crate) fn replica(&self) -> Result<Self> {
        let dir = tempfile::tempdir().context("Failed to create replica dir")?;
        Self::with_backend(
            dir,
            Arc::clone(&self.store),
            Arc::clone(&self.admin),
            self.settings.topology,
            self.settings.ldap_mapping,
        )
    }

    fn with_backend(
        dir: TempDir,
        store: Arc<MemoryStore>,
        admin: Arc<FakeAdmin>,
        topology: Topology,
        ldap_mapping: Partition,
    ) -> Result<Self> {
        let root = dir.path();
        let bin = root.join("bin");
        let jetty = root.join("jetty");
        fs::create_dir_all(&bin).context("Failed to create bin dir")?;
        fs::create_dir_all(&jetty).context("Failed to create jetty dir")?;
        fs::write(jetty.join("webdefault.xml"), WEBDEFAULT_XML)?;
        fs::write(jetty.join("jetty.xml"), JETTY_XML)?;
        fs::write(root.join("couchbase_password"), "cb-admin-pw\n")?;

        let mut settings = Settings::new(None).context("Failed to load default settings")?;
        settings.topology = topology;
        settings.ldap_mapping = ldap_mapping;
        settings.ldap_url = "ldap.example.org:1636".to_string();
        settings.couchbase_url = "cb1.example.org,cb2.example.org".to_string();
        settings.paths.certs_dir = root.join("certs");
        settings.paths.conf_dir = root.join("conf");
        settings.paths.idp_dir = root.join("idp");
        settings.paths.templates_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates");
        settings.paths.jetty_webdefault = jetty.join("webdefault.xml");
        settings.paths.jetty_config = jetty.join("jetty.xml");
        settings.keygen.program = write_fake_keygen(&bin)?.display().to_string();
        settings.keygen.timeout = Duration::from_secs(10);
        settings.keytool.program = write_fake_keytool(&bin)?.display().to_string();
        settings.keytool.timeout = Duration::from_secs(10);
        settings.couchbase.password_file = root.join("couchbase_password");
        settings.sealer.wait_attempts = 500;
        settings.sealer.wait_interval = Duration::from_millis(10);
        settings.retry.backoff_secs = vec![1];
        settings.validate()?;

        Ok(Self {
            dir,
            store,
            admin,
            settings,
        })
    }

    pub(crate) fn root(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn pipeline(&self, owner: &str) -> Pipeline {
        let config = ConfigManager::new(self.store.clone(), CONFIG_PREFIX);
        let secrets = SecretManager::new(self.store.clone(), SECRET_PREFIX, CipherScheme::Legacy);
        Pipeline::new(
            self.settings.clone(),
            config,
            secrets,
            Some(self.admin.clone()),
            owner,
        )
    }

    pub(crate) fn keygen_calls(&self) -> usize {
        fs::read_to_string(self.root().join("bin").join("keygen.calls"))
            .map(|calls| calls.lines().count())
            .unwrap_or(0)
    }

    /// Files under the artifact directories, relative to the fixture root.
    pub(crate) fn artifacts(&self) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        for top in ["certs", "conf", "idp"] {
            collect_files(self.root(), &self.root().join(top), &mut found);
        }
        found
    }

    pub(crate) fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.root().join(relative))
            .unwrap_or_else(|err| panic!("read {relative}: {err}"))
    }

    pub(crate) fn read_bytes(&self, relative: &str) -> Vec<u8> {
        fs::read(self.root().join(relative)).unwrap_or_else(|err| panic!("read {relative}: {err}"))
    }
}

fn collect_files(root: &Path, dir: &Path, found: &mut BTreeSet<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, found);
        } else if let Ok(relative) = path.strip_prefix(root) {
            found.insert(relative.display().to_string());
        }
    }
}

/// Topology-independent artifacts plus `extra`.
pub(crate) fn expected_with_common(extra: &[&str]) -> BTreeSet<String> {
    COMMON_ARTIFACTS
        .iter()
        .chain(extra)
        .map(ToString::to_string)
        .collect()
}

const COMMON_ARTIFACTS: [&str; 15] = [
    "certs/gluu_https.crt",
    "certs/gluu_https.key",
    "certs/idp-encryption.crt",
    "certs/idp-encryption.key",
    "certs/idp-signing.crt",
    "certs/idp-signing.key",
    "certs/sealer.jks",
    "certs/sealer.kver",
    "certs/shibIDP.jks",
    "conf/salt",
    "idp/conf/attribute-resolver.xml",
    "idp/conf/global.xml",
    "idp/conf/idp.properties",
    "idp/conf/ldap.properties",
    "idp/metadata/idp-metadata.xml",
];
