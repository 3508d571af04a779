//! Replay command
//!
//! Loads a boot scenario, registers its components, then serves its load
//! requests through the front door, optionally from several workers at once.
//!
//! A scenario file (TOML, YAML or JSON by extension) looks like:
//!
//! ```toml
//! [policy]
//! eligible = ["camera", "cnss2"]
//! deferred = ["sec_debug"]
//!
//! [[components]]
//! name = "camera"
//! status = 0
//! delay_ms = 5
//!
//! [[params]]
//! component = "camera"
//! name = "debug"
//! kind = "int"
//!
//! [[requests]]
//! name = "camera"
//! args = "debug=1"
//! ```

use super::CommandContext;
use anyhow::{Context, Result};
use clap::Parser;
use lazyinit::config::{read_document, PolicyConfig};
use lazyinit::dispatch::{DispatchResult, LazyInit};
use lazyinit::error::Error;
use lazyinit::loader::{build_image, Loader};
use lazyinit::params::{ParamKind, ParamTable};
use lazyinit::registry::Registrar;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Arguments for the replay command
#[derive(Parser, Debug, Clone)]
pub struct ReplayArgs {
    /// Scenario file to replay
    pub scenario: PathBuf,

    /// Number of concurrent workers serving requests
    #[arg(long, short = 'p', default_value = "1")]
    pub parallel: usize,

    /// Print per-initializer timings at the end
    #[arg(long)]
    pub timings: bool,
}

/// A boot scenario.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Policy tables; the configured ones are used when empty
    pub policy: PolicyConfig,
    /// Components discovered during the boot scan
    pub components: Vec<ComponentSpec>,
    /// Declared component parameters
    pub params: Vec<ParamSpec>,
    /// Load requests, in submission order
    pub requests: Vec<RequestSpec>,
}

/// A component and the behavior of its initializer.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub delay_ms: u64,
}

/// A declared parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct ParamSpec {
    pub component: String,
    pub name: String,
    pub kind: ParamKind,
}

/// One load request.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestSpec {
    pub name: String,
    #[serde(default)]
    pub args: Option<String>,
}

impl Scenario {
    /// Load a scenario file, choosing the format by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        read_document(path).with_context(|| format!("Failed to read scenario: {}", path.display()))
    }
}

type Outcome = (usize, String, std::result::Result<DispatchResult, Error>);

impl ReplayArgs {
    /// Execute the replay command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let scenario = Scenario::from_file(&self.scenario)?;

        let mut config = ctx.config.clone();
        if !scenario.policy.is_empty() {
            config.policy = scenario.policy.clone();
        }
        if let Err(e) = config.validate() {
            ctx.output.error(&e.to_string());
            return Ok(e.exit_code());
        }

        let registrar = Registrar::new(config.to_policy());
        for component in &scenario.components {
            let status = component.status;
            let delay = Duration::from_millis(component.delay_ms);
            if !registrar.register(component.name.clone(), move || {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                status
            }) {
                ctx.output
                    .debug(&format!("{} not deferred, runs at boot", component.name));
            }
        }

        let params = ParamTable::new();
        for param in &scenario.params {
            params.declare(&param.component, &param.name, param.kind);
        }

        let released = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&released);
        let core = LazyInit::builder(registrar)
            .config(&config)
            .params(Arc::new(params))
            .on_release(move || flag.store(true, Ordering::SeqCst))
            .build();
        let loader = Loader::new(core.clone());

        ctx.output.section(&format!(
            "REPLAY [{}] {} request(s), {} worker(s)",
            self.scenario.display(),
            scenario.requests.len(),
            self.parallel.max(1)
        ));

        let mut outcomes = self.serve(&loader, &scenario.requests).await?;
        outcomes.sort_by_key(|(seq, _, _)| *seq);

        let mut fatal = None;
        for (_, name, outcome) in &outcomes {
            match outcome {
                Ok(result) => ctx.output.dispatch_result(name, result),
                Err(e) => {
                    ctx.output.error(&e.to_string());
                    if !e.is_recoverable() && fatal.is_none() {
                        fatal = Some(e.exit_code());
                    }
                }
            }
        }

        ctx.output.completion(core.is_completed(), &core.pending());
        if self.timings {
            let metrics = core.metrics();
            if ctx.output.is_json() {
                println!("{}", metrics.to_json());
            } else {
                metrics.report();
            }
        }

        if let Some(code) = fatal {
            return Ok(code);
        }
        if released.load(Ordering::SeqCst) {
            ctx.output.debug("startup resources released");
        }
        Ok(if core.is_completed() { 0 } else { 1 })
    }

    /// Dispatch every request, round-robin over the workers.
    async fn serve(&self, loader: &Loader, requests: &[RequestSpec]) -> Result<Vec<Outcome>> {
        let workers = self.parallel.max(1);
        let mut batches: Vec<Vec<(usize, RequestSpec)>> = vec![Vec::new(); workers];
        for (seq, request) in requests.iter().cloned().enumerate() {
            batches[seq % workers].push((seq, request));
        }

        let mut handles = Vec::with_capacity(workers);
        for batch in batches.into_iter().filter(|b| !b.is_empty()) {
            let loader = loader.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                batch
                    .into_iter()
                    .map(|(seq, request)| {
                        let image = build_image(&request.name, &[]);
                        let args = request.args.as_deref().map(str::as_bytes);
                        let outcome = loader.load_image(&image, args);
                        (seq, request.name, outcome)
                    })
                    .collect::<Vec<_>>()
            }));
        }

        let mut outcomes = Vec::with_capacity(requests.len());
        for handle in handles {
            let batch = handle
                .await
                .map_err(|e| Error::Internal(format!("replay worker failed: {}", e)))?;
            outcomes.extend(batch);
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_scenario() {
        let scenario: Scenario = toml::from_str(
            r#"
            [policy]
            eligible = ["camera"]

            [[components]]
            name = "camera"
            status = -5

            [[params]]
            component = "camera"
            name = "debug"
            kind = "bool"

            [[requests]]
            name = "camera"
            args = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(scenario.policy.eligible, vec!["camera".to_string()]);
        assert_eq!(scenario.components[0].status, -5);
        assert_eq!(scenario.components[0].delay_ms, 0);
        assert_eq!(scenario.params[0].kind, ParamKind::Bool);
        assert_eq!(scenario.requests[0].args.as_deref(), Some("debug"));
    }

    #[test]
    fn test_missing_scenario_is_file_not_found() {
        let err = Scenario::from_file(Path::new("/nonexistent/boot.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read scenario"));
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_parse_yaml_scenario() {
        let scenario: Scenario = serde_yaml::from_str(
            "components:\n  - name: a\nrequests:\n  - name: a\n  - name: b\n",
        )
        .unwrap();
        assert_eq!(scenario.components.len(), 1);
        assert_eq!(scenario.requests.len(), 2);
        assert!(scenario.requests[1].args.is_none());
    }
}
