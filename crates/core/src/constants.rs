/// Constants used throughout the avp codebase
// Annotation keys read from manifest metadata
pub const AVP_IGNORE_ANNOTATION: &str = "avp.kubernetes.io/ignore";
pub const AVP_PATH_ANNOTATION: &str = "avp.kubernetes.io/path";
pub const AVP_KV_VERSION_ANNOTATION: &str = "avp.kubernetes.io/kv-version";
pub const AVP_SECRET_VERSION_ANNOTATION: &str = "avp.kubernetes.io/secret-version";
pub const AVP_REMOVE_MISSING_ANNOTATION: &str = "avp.kubernetes.io/remove-missing";

// Environment variable names
pub const ENV_AVP_TYPE: &str = "AVP_TYPE";
pub const ENV_AVP_AUTH_TYPE: &str = "AVP_AUTH_TYPE";
pub const ENV_AVP_ROLE_ID: &str = "AVP_ROLE_ID";
pub const ENV_AVP_SECRET_ID: &str = "AVP_SECRET_ID";
pub const ENV_AVP_MOUNT_PATH: &str = "AVP_MOUNT_PATH";
pub const ENV_AVP_K8S_ROLE: &str = "AVP_K8S_ROLE";
pub const ENV_AVP_K8S_MOUNT_PATH: &str = "AVP_K8S_MOUNT_PATH";
pub const ENV_AVP_K8S_TOKEN_PATH: &str = "AVP_K8S_TOKEN_PATH";
pub const ENV_AVP_KV_VERSION: &str = "AVP_KV_VERSION";
pub const ENV_AVP_PATH_VALIDATION: &str = "AVP_PATH_VALIDATION";
pub const ENV_AVP_SECRET_DIR: &str = "AVP_SECRET_DIR";
pub const ENV_AVP_HTTP_TIMEOUT_SECS: &str = "AVP_HTTP_TIMEOUT_SECS";
pub const ENV_VAULT_ADDR: &str = "VAULT_ADDR";
pub const ENV_VAULT_TOKEN: &str = "VAULT_TOKEN";
pub const ENV_VAULT_NAMESPACE: &str = "VAULT_NAMESPACE";
pub const ENV_VAULT_CACERT: &str = "VAULT_CACERT";
pub const ENV_VAULT_SKIP_VERIFY: &str = "VAULT_SKIP_VERIFY";

/// Every key the configuration loader understands, in documentation order
pub const CONFIG_KEYS: &[&str] = &[
    ENV_AVP_TYPE,
    ENV_AVP_AUTH_TYPE,
    ENV_AVP_ROLE_ID,
    ENV_AVP_SECRET_ID,
    ENV_AVP_MOUNT_PATH,
    ENV_AVP_K8S_ROLE,
    ENV_AVP_K8S_MOUNT_PATH,
    ENV_AVP_K8S_TOKEN_PATH,
    ENV_AVP_KV_VERSION,
    ENV_AVP_PATH_VALIDATION,
    ENV_AVP_SECRET_DIR,
    ENV_AVP_HTTP_TIMEOUT_SECS,
    ENV_VAULT_ADDR,
    ENV_VAULT_TOKEN,
    ENV_VAULT_NAMESPACE,
    ENV_VAULT_CACERT,
    ENV_VAULT_SKIP_VERIFY,
];

// Secret directory marker resolved against the repository root
pub const GIT_ROOT_MARKER: &str = "GIT_ROOT";

// Output stream separator, written on its own line after every manifest
pub const DOCUMENT_SEPARATOR: &str = "---";

// Path argument meaning "read manifests from standard input"
pub const STDIN_PATH: &str = "-";

// Defaults
pub const DEFAULT_KV_VERSION: &str = "2";
pub const DEFAULT_K8S_MOUNT_PATH: &str = "auth/kubernetes";
pub const DEFAULT_K8S_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
pub const DEFAULT_APPROLE_MOUNT_PATH: &str = "auth/approle";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

// Manifest file extensions picked up during discovery
pub const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];
