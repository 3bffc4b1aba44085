//! Process-wide model handles.
//!
//! Creating a provider client (and, for local backends, loading weights) is
//! the most expensive thing a request can do, so each distinct model is
//! created once per process and shared read-only afterwards.
//!
//! ## Initialisation discipline
//!
//! [`ModelCache`] maps a [`ModelKey`] to a `tokio::sync::OnceCell`. The map
//! lock is held only long enough to find or insert the cell; the (possibly
//! slow) initialiser runs inside `OnceCell::get_or_try_init`, which lets
//! exactly one caller initialise while concurrent callers for the same key
//! wait on the result. A failed initialisation leaves the cell empty, so the
//! next request tries again. Handles are never torn down.
//!
//! ## Provider resolution
//!
//! [`ProviderSpec::resolve`] picks the concrete provider, from most-specific
//! to least-specific:
//!
//! 1. **Pre-built provider** — used as-is, never cached here.
//! 2. **Named provider + model** — e.g. `openai` / `gpt-4.1-nano`.
//! 3. **Environment pair** — `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
//! 4. **OpenAI key present** — `OPENAI_API_KEY` selects `openai`.
//! 5. **Full auto-detection** — `ProviderFactory::from_env()`.

use crate::error::IdentifyError;
use edgequake_llm::{LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Model used when a provider is named without a model.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// What a model handle is used for. Part of the cache key so the OCR reader
/// and the classifier never share a client configured for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    Ocr,
    Classifier,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::Ocr => f.write_str("ocr"),
            ModelRole::Classifier => f.write_str("classifier"),
        }
    }
}

/// Identity of a cached model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub role: ModelRole,
    pub provider: String,
    pub model: String,
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.role, self.provider, self.model)
    }
}

/// Initialise-once, read-many map of shared handles.
pub struct ModelCache<T> {
    cells: Mutex<HashMap<ModelKey, Arc<OnceCell<T>>>>,
}

impl<T: Clone> ModelCache<T> {
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Return the handle for `key`, running `init` if none exists yet.
    ///
    /// Concurrent callers for the same key run `init` at most once between
    /// them.
    pub async fn get_or_try_init<F, Fut, E>(&self, key: &ModelKey, init: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(cells.entry(key.clone()).or_default())
        };
        cell.get_or_try_init(init).await.cloned()
    }

    /// Whether `key` holds an initialised handle.
    pub fn contains(&self, key: &ModelKey) -> bool {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.get(key).is_some_and(|cell| cell.initialized())
    }
}

impl<T: Clone> Default for ModelCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

static PROVIDERS: Lazy<ModelCache<Arc<dyn LLMProvider>>> = Lazy::new(ModelCache::new);

/// How to obtain the provider behind a backend.
#[derive(Clone, Default)]
pub struct ProviderSpec {
    /// Pre-constructed provider. Takes precedence over everything else.
    pub provider: Option<Arc<dyn LLMProvider>>,
    /// Provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,
    /// Model identifier. `None` uses [`DEFAULT_VISION_MODEL`].
    pub model: Option<String>,
}

impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .finish()
    }
}

/// Where a resolved provider comes from.
enum Resolution {
    Prebuilt(Arc<dyn LLMProvider>),
    Named { provider: String, model: String },
    Auto,
}

impl ProviderSpec {
    /// Walk the resolution chain. Reads the environment but creates nothing.
    fn resolve(&self) -> Resolution {
        if let Some(ref provider) = self.provider {
            return Resolution::Prebuilt(Arc::clone(provider));
        }

        let model = || {
            self.model
                .clone()
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string())
        };

        if let Some(ref name) = self.provider_name {
            return Resolution::Named {
                provider: name.clone(),
                model: model(),
            };
        }

        if let (Ok(prov), Ok(model)) = (
            std::env::var("EDGEQUAKE_LLM_PROVIDER"),
            std::env::var("EDGEQUAKE_MODEL"),
        ) {
            if !prov.is_empty() && !model.is_empty() {
                return Resolution::Named {
                    provider: prov,
                    model,
                };
            }
        }

        if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
            return Resolution::Named {
                provider: "openai".to_string(),
                model: model(),
            };
        }

        Resolution::Auto
    }
}

/// A lazily-created, process-wide shared provider for one role.
///
/// Cloning a handle is cheap; the provider itself is created on the first
/// call to [`ModelHandle::provider`].
#[derive(Clone, Debug)]
pub struct ModelHandle {
    role: ModelRole,
    spec: ProviderSpec,
}

impl ModelHandle {
    pub fn new(role: ModelRole, spec: ProviderSpec) -> Self {
        Self { role, spec }
    }

    /// The shared provider, creating it on first use.
    pub async fn provider(&self) -> Result<Arc<dyn LLMProvider>, IdentifyError> {
        match self.spec.resolve() {
            Resolution::Prebuilt(provider) => Ok(provider),
            Resolution::Named { provider, model } => {
                let key = ModelKey {
                    role: self.role,
                    provider,
                    model,
                };
                PROVIDERS
                    .get_or_try_init(&key, || async {
                        info!("Initialising {} model {}", self.role, key);
                        create_vision_provider(&key.provider, &key.model)
                    })
                    .await
            }
            Resolution::Auto => {
                let key = ModelKey {
                    role: self.role,
                    provider: "auto".to_string(),
                    model: "auto".to_string(),
                };
                PROVIDERS
                    .get_or_try_init(&key, || async {
                        info!("Auto-detecting {} provider from environment", self.role);
                        auto_detect_provider()
                    })
                    .await
            }
        }
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, IdentifyError> {
    debug!("Creating provider {} / {}", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        IdentifyError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn auto_detect_provider() -> Result<Arc<dyn LLMProvider>, IdentifyError> {
    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| IdentifyError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "no vision provider could be auto-detected from the environment; \
                 set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider ({e})"
            ),
        })?;
    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(model: &str) -> ModelKey {
        ModelKey {
            role: ModelRole::Ocr,
            provider: "test".to_string(),
            model: model.to_string(),
        }
    }

    #[tokio::test]
    async fn initialises_once_per_key() {
        let cache: ModelCache<Arc<String>> = ModelCache::new();
        let inits = AtomicUsize::new(0);

        for _ in 0..3 {
            let v = cache
                .get_or_try_init(&key("a"), || async {
                    inits.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(Arc::new("model-a".to_string()))
                })
                .await
                .unwrap();
            assert_eq!(*v, "model-a");
        }
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_initialisation() {
        let cache: Arc<ModelCache<usize>> = Arc::new(ModelCache::new());
        let inits = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let inits = Arc::clone(&inits);
                tokio::spawn(async move {
                    cache
                        .get_or_try_init(&key("shared"), || async move {
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok::<_, ()>(inits.fetch_add(1, Ordering::SeqCst) + 1)
                        })
                        .await
                        .unwrap()
                })
            })
            .collect();

        for t in tasks {
            assert_eq!(t.await.unwrap(), 1);
        }
        assert_eq!(inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_init_is_retried() {
        let cache: ModelCache<u8> = ModelCache::new();
        let first = cache
            .get_or_try_init(&key("flaky"), || async { Err::<u8, _>("offline") })
            .await;
        assert_eq!(first, Err("offline"));
        assert!(!cache.contains(&key("flaky")));

        let second = cache
            .get_or_try_init(&key("flaky"), || async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(second, Ok(7));
    }

    #[test]
    fn roles_are_part_of_identity() {
        let ocr = key("m");
        let cls = ModelKey {
            role: ModelRole::Classifier,
            ..ocr.clone()
        };
        assert_ne!(ocr, cls);
        assert_eq!(ocr.to_string(), "ocr:test/m");
    }

    #[test]
    fn named_provider_uses_default_model() {
        let spec = ProviderSpec {
            provider_name: Some("openai".to_string()),
            ..Default::default()
        };
        match spec.resolve() {
            Resolution::Named { provider, model } => {
                assert_eq!(provider, "openai");
                assert_eq!(model, DEFAULT_VISION_MODEL);
            }
            _ => panic!("expected a named provider"),
        }
    }
}
