//! Deploy stage: mirror the built output directory to an object store.
//!
//! Stage 3 of the sitepress pipeline. Runs only after a successful build.
//!
//! ## Flow
//!
//! 1. [`ArtifactIndex::from_dir`] hashes every file of the output directory.
//! 2. The remote listing and the stored [`SyncState`] are fetched.
//! 3. [`plan`] sorts every key into upload / unchanged / delete / keep.
//! 4. [`sync`] uploads in a bounded rayon pool, retrying transient failures
//!    with exponential backoff. Any upload that still fails stops the run
//!    before anything is deleted or the state is touched.
//! 5. Stale objects are deleted (`mirror` mode), then the state object is
//!    written if it changed.
//!
//! An unchanged artifact therefore costs one list and one get, and writes
//! nothing.
//!
//! ## Credentials
//!
//! Never read from `config.yaml`. [`S3Settings::resolve`] takes them from
//! `SITEPRESS_ACCESS_KEY` / `SITEPRESS_SECRET_KEY`, falling back to
//! `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`, and fails before any request
//! when neither is set.

pub mod memory;
pub mod remote;
pub mod s3;
pub mod state;

use crate::config::{DeploymentConfig, SyncMode};
use crate::scan::relative_key;
use backon::{BlockingRetryable, ExponentialBuilder};
use rayon::prelude::*;
use remote::{RemoteError, RemoteObject, RemoteStore};
use state::{STATE_KEY, SyncState, hash_bytes};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("missing credentials: set {0}")]
    MissingCredentials(&'static str),
    #[error("no bucket configured (deployment.bucket or --bucket)")]
    MissingBucket,
    #[error("no endpoint configured (deployment.endpoint, SITEPRESS_ENDPOINT or --endpoint)")]
    MissingEndpoint,
    #[error("nothing to deploy: {0} is empty; run build first")]
    EmptyArtifact(PathBuf),
    #[error("{} upload(s) failed, nothing deleted: {}", failed.len(), failed.join("; "))]
    Upload { failed: Vec<String> },
    #[error("{} delete(s) failed: {}", failed.len(), failed.join("; "))]
    Delete { failed: Vec<String> },
}

// ============================================================================
// Local artifact
// ============================================================================

/// One file of the built output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalObject {
    /// `/`-separated path relative to the output root; also the object key.
    pub key: String,
    pub path: PathBuf,
    pub hash: String,
    pub size: u64,
    pub content_type: String,
}

/// Every file of an output directory, ordered by key.
#[derive(Debug, Clone, Default)]
pub struct ArtifactIndex {
    pub objects: Vec<LocalObject>,
}

impl ArtifactIndex {
    /// Index a built output directory. Refuses a missing or empty directory,
    /// which in mirror mode would otherwise wipe the bucket.
    pub fn from_dir(dir: &Path) -> Result<Self, DeployError> {
        if !dir.is_dir() {
            return Err(DeployError::EmptyArtifact(dir.to_path_buf()));
        }
        let mut objects = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let key = relative_key(dir, entry.path());
            if key == STATE_KEY {
                log::warn!("skipping {key} in the output directory: the name is reserved");
                continue;
            }
            let bytes = fs::read(entry.path())?;
            objects.push(LocalObject {
                content_type: content_type_for(&key),
                hash: hash_bytes(&bytes),
                size: bytes.len() as u64,
                path: entry.path().to_path_buf(),
                key,
            });
        }
        if objects.is_empty() {
            return Err(DeployError::EmptyArtifact(dir.to_path_buf()));
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(Self { objects })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&LocalObject> {
        self.objects
            .binary_search_by(|o| o.key.as_str().cmp(key))
            .ok()
            .map(|i| &self.objects[i])
    }

    pub fn total_bytes(&self) -> u64 {
        self.objects.iter().map(|o| o.size).sum()
    }

    /// The state this artifact leaves behind once fully uploaded.
    pub fn state(&self) -> SyncState {
        let mut state = SyncState::empty();
        state.entries = self
            .objects
            .iter()
            .map(|o| (o.key.clone(), o.hash.clone()))
            .collect::<BTreeMap<_, _>>();
        state
    }
}

/// `Content-Type` for an object key. Text and XML types carry a UTF-8 charset.
pub fn content_type_for(key: &str) -> String {
    let mime = mime_guess::from_path(key).first_or_octet_stream();
    let essence = mime.essence_str();
    if mime.type_() == mime_guess::mime::TEXT || essence.ends_with("xml") {
        format!("{essence}; charset=utf-8")
    } else {
        essence.to_string()
    }
}

// ============================================================================
// Planning
// ============================================================================

/// What a sync will do, key by key. Every list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub uploads: Vec<String>,
    pub unchanged: Vec<String>,
    /// Remote keys absent from the artifact, removed in mirror mode.
    pub deletes: Vec<String>,
    /// Remote keys absent from the artifact, left alone in additive mode.
    pub kept: Vec<String>,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.uploads.is_empty() && self.deletes.is_empty()
    }
}

/// Decide every key's fate.
///
/// A local file is unchanged only when the state records its exact hash and
/// the object is still listed remotely; otherwise it is uploaded.
pub fn plan(local: &ArtifactIndex, remote: &[RemoteObject], state: &SyncState, mode: SyncMode) -> SyncPlan {
    let remote_keys: HashSet<&str> = remote
        .iter()
        .map(|o| o.key.as_str())
        .filter(|k| *k != STATE_KEY)
        .collect();

    let mut plan = SyncPlan::default();
    for object in &local.objects {
        let recorded = state.hash_of(&object.key) == Some(object.hash.as_str());
        if recorded && remote_keys.contains(object.key.as_str()) {
            plan.unchanged.push(object.key.clone());
        } else {
            plan.uploads.push(object.key.clone());
        }
    }

    let mut stale: Vec<String> = remote_keys
        .into_iter()
        .filter(|k| local.get(k).is_none())
        .map(str::to_string)
        .collect();
    stale.sort();
    match mode {
        SyncMode::Mirror => plan.deletes = stale,
        SyncMode::Additive => plan.kept = stale,
    }
    plan
}

// ============================================================================
// Execution
// ============================================================================

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub mode: SyncMode,
    /// Concurrent uploads.
    pub parallelism: usize,
    /// Retries per request after the first attempt.
    pub retries: usize,
    /// First backoff delay; doubles per retry.
    pub retry_delay: Duration,
    /// Plan only; no request other than list and get is made.
    pub dry_run: bool,
}

impl SyncOptions {
    pub fn from_config(deployment: &DeploymentConfig) -> Self {
        Self {
            mode: deployment.mode,
            parallelism: deployment.parallelism.max(1),
            retries: deployment.retries,
            retry_delay: Duration::from_millis(500),
            dry_run: false,
        }
    }
}

/// Outcome of a sync.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub plan: SyncPlan,
    pub uploaded: usize,
    pub uploaded_bytes: u64,
    pub deleted: usize,
    pub state_written: bool,
    pub dry_run: bool,
}

/// Run `op`, retrying transient failures with exponential backoff.
fn with_retry<T>(
    options: &SyncOptions,
    what: &str,
    op: impl FnMut() -> Result<T, RemoteError>,
) -> Result<T, RemoteError> {
    let backoff = ExponentialBuilder::default()
        .with_min_delay(options.retry_delay)
        .with_max_times(options.retries);
    op.retry(backoff)
        .sleep(std::thread::sleep)
        .when(RemoteError::is_transient)
        .notify(|err, delay| log::warn!("{what}: {err}; retrying in {delay:?}"))
        .call()
}

/// Make `store` match `local` according to `options`.
pub fn sync(local: &ArtifactIndex, store: &dyn RemoteStore, options: &SyncOptions) -> Result<SyncReport, DeployError> {
    if local.is_empty() {
        return Err(DeployError::EmptyArtifact(PathBuf::new()));
    }

    let remote = with_retry(options, "list", || store.list())?;
    let stored = with_retry(options, STATE_KEY, || store.get(STATE_KEY))?;
    let old_state = SyncState::load(stored.as_deref());
    let plan = plan(local, &remote, &old_state, options.mode);
    log::info!(
        "sync plan: {} upload, {} unchanged, {} delete, {} kept",
        plan.uploads.len(),
        plan.unchanged.len(),
        plan.deletes.len(),
        plan.kept.len()
    );

    let mut report = SyncReport {
        dry_run: options.dry_run,
        ..Default::default()
    };
    if options.dry_run {
        report.plan = plan;
        return Ok(report);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.parallelism.max(1))
        .build()?;
    let results: Vec<Result<u64, String>> = pool.install(|| {
        plan.uploads
            .par_iter()
            .map(|key| upload(local, store, options, key))
            .collect()
    });
    let mut failed = Vec::new();
    for result in results {
        match result {
            Ok(bytes) => {
                report.uploaded += 1;
                report.uploaded_bytes += bytes;
            }
            Err(message) => failed.push(message),
        }
    }
    if !failed.is_empty() {
        return Err(DeployError::Upload { failed });
    }

    let mut delete_failures = Vec::new();
    for key in &plan.deletes {
        match with_retry(options, key, || store.delete(key)) {
            Ok(()) => report.deleted += 1,
            Err(e) => delete_failures.push(format!("{key}: {e}")),
        }
    }

    let new_state = local.state();
    if new_state != old_state {
        let bytes = new_state.to_bytes()?;
        with_retry(options, STATE_KEY, || store.put(STATE_KEY, &bytes, "application/json"))?;
        report.state_written = true;
    }

    if !delete_failures.is_empty() {
        return Err(DeployError::Delete {
            failed: delete_failures,
        });
    }
    report.plan = plan;
    Ok(report)
}

fn upload(local: &ArtifactIndex, store: &dyn RemoteStore, options: &SyncOptions, key: &str) -> Result<u64, String> {
    let object = local
        .get(key)
        .ok_or_else(|| format!("{key}: not in the artifact"))?;
    let bytes = fs::read(&object.path).map_err(|e| format!("{key}: {e}"))?;
    with_retry(options, key, || store.put(key, &bytes, &object.content_type))
        .map_err(|e| format!("{key}: {e}"))?;
    Ok(object.size)
}

// ============================================================================
// Settings
// ============================================================================

/// Command-line overrides of the `deployment` block.
#[derive(Debug, Clone, Default)]
pub struct DeployOverrides {
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub mode: Option<SyncMode>,
}

/// Everything needed to reach the bucket.
#[derive(Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub acl: String,
    pub path_style: bool,
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("acl", &self.acl)
            .field("path_style", &self.path_style)
            .finish_non_exhaustive()
    }
}

impl S3Settings {
    /// Combine config, command-line overrides and the environment.
    ///
    /// Precedence: flag, then environment (endpoint only), then config.
    /// `env` looks up a variable; empty values count as unset.
    pub fn resolve(
        deployment: &DeploymentConfig,
        overrides: &DeployOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DeployError> {
        let var = |name: &str| env(name).filter(|v| !v.is_empty());
        let bucket = overrides
            .bucket
            .clone()
            .unwrap_or_else(|| deployment.bucket.clone());
        if bucket.is_empty() {
            return Err(DeployError::MissingBucket);
        }
        let endpoint = overrides
            .endpoint
            .clone()
            .or_else(|| var("SITEPRESS_ENDPOINT"))
            .unwrap_or_else(|| deployment.endpoint.clone());
        if endpoint.is_empty() {
            return Err(DeployError::MissingEndpoint);
        }
        let access_key = var("SITEPRESS_ACCESS_KEY")
            .or_else(|| var("AWS_ACCESS_KEY_ID"))
            .ok_or(DeployError::MissingCredentials("SITEPRESS_ACCESS_KEY or AWS_ACCESS_KEY_ID"))?;
        let secret_key = var("SITEPRESS_SECRET_KEY")
            .or_else(|| var("AWS_SECRET_ACCESS_KEY"))
            .ok_or(DeployError::MissingCredentials("SITEPRESS_SECRET_KEY or AWS_SECRET_ACCESS_KEY"))?;
        Ok(Self {
            bucket,
            endpoint,
            region: overrides
                .region
                .clone()
                .unwrap_or_else(|| deployment.region.clone()),
            acl: deployment.acl.clone(),
            path_style: deployment.path_style,
            access_key,
            secret_key,
        })
    }
}
