//! Image build pipeline.
//!
//! Functions are built on a bounded worker pool. Named-language functions get
//! a private context under `build/<function>/`: the language template tree
//! first, then the handler tree overlaid into `function/`. Dockerfile
//! functions build straight from their handler directory.

use std::path::{Component, Path, PathBuf};

use crate::config::PipelineConfig;
use crate::container::{self, BuildFlags, ContainerTool};
use crate::error::{Error, Result};
use crate::manifest::{FunctionSpec, LanguageKind};
use crate::output::{BatchReport, ItemOutcome};
use crate::paths;
use crate::template;
use crate::utils::io;
use crate::worker;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub no_cache: bool,
    pub squash: bool,
    /// Assemble contexts on disk without invoking the build tool.
    pub shrinkwrap: bool,
}

impl BuildOptions {
    fn flags(&self) -> BuildFlags {
        BuildFlags {
            no_cache: self.no_cache,
            squash: self.squash,
        }
    }
}

// === Batch ===

/// Build every function that is not marked `skip_build`, in manifest order,
/// on `concurrency` workers.
///
/// Configuration problems (bad function names, languages without a template)
/// are reported before any worker starts. After that, the first function
/// error stops further dispatch; functions already handed to a worker still
/// finish. The returned report carries that error; use
/// [`BatchReport::into_result`] to surface it.
pub fn build(
    config: &PipelineConfig,
    functions: &[FunctionSpec],
    concurrency: usize,
    options: BuildOptions,
    tool: &dyn ContainerTool,
) -> Result<BatchReport> {
    let eligible: Vec<&FunctionSpec> = functions.iter().filter(|f| !f.skip_build).collect();
    for spec in &eligible {
        preflight(config, spec)?;
    }
    for spec in functions.iter().filter(|f| f.skip_build) {
        log_status!("build", "Skipping build of: {}.", spec.name);
    }

    let run = worker::run(&eligible, concurrency, "Builder", |idx, spec| {
        build_function(config, spec, options, tool, idx)
    });
    let dispatched = run.dispatched;
    let (slots, error) = run.by_index(eligible.len());

    let mut report = BatchReport::new("build");
    let mut slots = slots.into_iter();
    for spec in functions {
        if spec.skip_build {
            report.record(&spec.name, None, ItemOutcome::skipped("skip_build"));
            continue;
        }
        match slots.next().flatten() {
            Some(done) => match done.result {
                Ok(outcome) => report.record(&spec.name, Some(done.worker), outcome),
                Err(err) => report.record_error(&spec.name, Some(done.worker), &err),
            },
            None => report.record_not_dispatched(&spec.name),
        }
    }

    log_status!(
        "build",
        "Dispatched {} of {} function(s)",
        dispatched,
        eligible.len()
    );
    report.error = error;
    Ok(report)
}

/// Build one function on the calling thread.
pub fn build_single(
    config: &PipelineConfig,
    spec: &FunctionSpec,
    options: BuildOptions,
    tool: &dyn ContainerTool,
) -> Result<ItemOutcome> {
    preflight(config, spec)?;
    build_function(config, spec, options, tool, 0)
}

// === Per function ===

fn preflight(config: &PipelineConfig, spec: &FunctionSpec) -> Result<()> {
    validate_function_name(&spec.name)?;
    if let LanguageKind::Template(language) = spec.language_kind() {
        if !template::is_valid_template(config, language) {
            return Err(Error::template_language_unsupported(&spec.name, language));
        }
    }
    Ok(())
}

/// Function names become directory names under `build/`.
fn validate_function_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(Error::config_invalid_value(
            "name",
            Some(name.to_string()),
            "function names must be a single path segment",
        )),
    }
}

fn build_function(
    config: &PipelineConfig,
    spec: &FunctionSpec,
    options: BuildOptions,
    tool: &dyn ContainerTool,
    worker: usize,
) -> Result<ItemOutcome> {
    log_status!("build", "[{}] > Building: {}.", worker, spec.name);

    match spec.language_kind() {
        LanguageKind::Missing => {
            log_status!(
                "build",
                "[{}] Please provide a valid --lang or 'Dockerfile' for {}.",
                worker,
                spec.name
            );
            Ok(ItemOutcome::skipped("no language"))
        }
        LanguageKind::Dockerfile => {
            if options.shrinkwrap {
                log_status!("build", "[{}] Nothing to do for: {}.", worker, spec.name);
                return Ok(ItemOutcome::shrinkwrapped(&spec.handler));
            }

            let context = PathBuf::from(&spec.handler);
            if !context.exists() {
                log_status!(
                    "build",
                    "[{}] Unable to build {}, {} is an invalid path. Image not built.",
                    worker,
                    spec.image,
                    spec.handler
                );
                return Ok(ItemOutcome::skipped("handler path not found"));
            }

            log_status!(
                "build",
                "[{}] Building: {} with Dockerfile. Please wait..",
                worker,
                spec.image
            );
            run_build(config, spec, &context, options, tool, worker)
        }
        LanguageKind::Template(language) => {
            let context = assemble_context(config, spec, language)?;
            if options.shrinkwrap {
                log_status!(
                    "build",
                    "[{}] {} shrink-wrapped to {}",
                    worker,
                    spec.name,
                    context.display()
                );
                return Ok(ItemOutcome::shrinkwrapped(context.display().to_string()));
            }

            log_status!(
                "build",
                "[{}] Building: {} with {} template. Please wait..",
                worker,
                spec.image,
                language
            );
            run_build(config, spec, &context, options, tool, worker)
        }
    }
}

/// Lay out `build/<function>/` from the language template with the handler
/// overlaid into `function/`. Any previous context is cleared first.
pub fn assemble_context(
    config: &PipelineConfig,
    spec: &FunctionSpec,
    language: &str,
) -> Result<PathBuf> {
    let context = paths::build_context(config.workdir(), &spec.name);
    let function_dir = paths::build_function(config.workdir(), &spec.name);

    log_status!("build", "Clearing temporary build folder: {}", context.display());
    io::remove_dir_if_exists(&context, &format!("clear {}", context.display()))?;
    io::create_dir_all(&function_dir, &format!("create {}", function_dir.display()))?;

    let template_files = io::copy_tree(&config.language_dir(language), &context)?;
    let handler_files = io::copy_tree(Path::new(&spec.handler), &function_dir)?;
    log_status!(
        "build",
        "Prepared {}: {} template file(s), {} handler file(s)",
        context.display(),
        template_files,
        handler_files
    );

    Ok(context)
}

fn run_build(
    config: &PipelineConfig,
    spec: &FunctionSpec,
    context: &Path,
    options: BuildOptions,
    tool: &dyn ContainerTool,
    worker: usize,
) -> Result<ItemOutcome> {
    let args = container::build_args(&spec.image, options.flags(), config);
    let output = tool.run(Some(context), &args);

    if !output.success {
        log_status!(
            "build",
            "[{}] Image: {} failed with exit code {}",
            worker,
            spec.image,
            output.exit_code
        );
        let details = container::failure_details(&spec.name, tool, &args, &output);
        return Err(container::exit_code_hint(
            Error::build_failed(details),
            output.exit_code,
        ));
    }

    log_status!("build", "[{}] Image: {} built.", worker, spec.image);
    Ok(ItemOutcome::built(&spec.image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::tests::RecordingTool;
    use crate::defaults;
    use crate::output::ItemStatus;
    use std::fs;

    fn setup() -> (tempfile::TempDir, PipelineConfig) {
        let dir = tempfile::tempdir().unwrap();
        let mut config =
            PipelineConfig::from_defaults(dir.path().join("work"), &defaults::builtin_defaults());
        config.http_proxy = None;
        config.https_proxy = None;

        let python = config.language_dir("python");
        fs::create_dir_all(python.join("function")).unwrap();
        fs::write(python.join("template.yml"), "language: python\n").unwrap();
        fs::write(python.join("Dockerfile"), "FROM python").unwrap();
        fs::write(python.join("function/a.txt"), "T").unwrap();
        fs::write(python.join("function/t.txt"), "T2").unwrap();
        (dir, config)
    }

    fn handler(root: &Path, name: &str, files: &[(&str, &str)]) -> String {
        let path = root.join("handlers").join(name);
        fs::create_dir_all(&path).unwrap();
        for (file, content) in files {
            fs::write(path.join(file), content).unwrap();
        }
        path.display().to_string()
    }

    fn function(name: &str, language: &str, handler: &str) -> FunctionSpec {
        FunctionSpec {
            name: name.to_string(),
            handler: handler.to_string(),
            image: format!("fnship/{}", name),
            language: language.to_string(),
            skip_build: false,
            constraints: Vec::new(),
        }
    }

    #[test]
    fn handler_overlays_template_function_dir() {
        let (dir, config) = setup();
        let h = handler(dir.path(), "echo", &[("a.txt", "H"), ("b.txt", "H2")]);
        let spec = function("echo", "python", &h);

        let context = assemble_context(&config, &spec, "python").unwrap();

        let function_dir = context.join("function");
        assert_eq!(fs::read_to_string(function_dir.join("a.txt")).unwrap(), "H");
        assert_eq!(fs::read_to_string(function_dir.join("b.txt")).unwrap(), "H2");
        assert_eq!(fs::read_to_string(function_dir.join("t.txt")).unwrap(), "T2");
        assert!(context.join("Dockerfile").exists());
    }

    #[test]
    fn assemble_context_clears_previous_run() {
        let (dir, config) = setup();
        let h = handler(dir.path(), "echo", &[("a.txt", "H")]);
        let spec = function("echo", "python", &h);
        let stale = paths::build_function(config.workdir(), "echo").join("stale.txt");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "old").unwrap();

        assemble_context(&config, &spec, "python").unwrap();

        assert!(!stale.exists());
    }

    #[test]
    fn builds_template_function_in_its_context() {
        let (dir, config) = setup();
        let h = handler(dir.path(), "echo", &[("handler.py", "")]);
        let tool = RecordingTool::default();

        let report = build(
            &config,
            &[function("echo", "python", &h)],
            1,
            BuildOptions::default(),
            &tool,
        )
        .unwrap();

        assert!(report.is_success());
        assert_eq!(report.status_of("echo"), Some(ItemStatus::Built));
        let calls = tool.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].0.as_deref(),
            Some(paths::build_context(config.workdir(), "echo").as_path())
        );
        assert_eq!(calls[0].1, vec!["build", "-t", "fnship/echo", "."]);
    }

    #[test]
    fn dispatches_every_eligible_function_once() {
        let (dir, config) = setup();
        let h = handler(dir.path(), "shared", &[("handler.py", "")]);
        let mut functions: Vec<FunctionSpec> = (0..6)
            .map(|i| function(&format!("fn-{}", i), "python", &h))
            .collect();
        functions[2].skip_build = true;
        functions[4].skip_build = true;
        let tool = RecordingTool::default();

        let report = build(&config, &functions, 3, BuildOptions::default(), &tool).unwrap();

        assert!(report.is_success());
        let mut images: Vec<String> = tool.calls().into_iter().map(|(_, a)| a[2].clone()).collect();
        images.sort();
        assert_eq!(images, vec!["fnship/fn-0", "fnship/fn-1", "fnship/fn-3", "fnship/fn-5"]);
        assert_eq!(report.summary.skipped, 2);
        assert_eq!(report.summary.succeeded, 4);
    }

    #[test]
    fn first_failure_is_reported_and_in_flight_builds_finish() {
        let (dir, config) = setup();
        let h = handler(dir.path(), "shared", &[("handler.py", "")]);
        let functions = vec![
            function("one", "python", &h),
            function("two", "python", &h),
            function("three", "python", &h),
        ];
        let mut tool = RecordingTool::failing(&["fnship/two"]);
        tool.delay_ms = 20;

        let report = build(&config, &functions, 3, BuildOptions::default(), &tool).unwrap();

        assert_eq!(report.status_of("one"), Some(ItemStatus::Built));
        assert_eq!(report.status_of("two"), Some(ItemStatus::Failed));
        let err = report.into_result().unwrap_err();
        assert_eq!(err.code.as_str(), "build.failed");
        assert_eq!(err.details["function"], "two");
        assert_eq!(err.details["stderr"], "denied");
    }

    #[test]
    fn single_worker_stops_dispatching_after_failure() {
        let (dir, config) = setup();
        let h = handler(dir.path(), "shared", &[("handler.py", "")]);
        let functions: Vec<FunctionSpec> = (0..5)
            .map(|i| function(&format!("fn-{}", i), "python", &h))
            .collect();
        let tool = RecordingTool::failing(&["fnship/fn-0"]);

        let report = build(&config, &functions, 1, BuildOptions::default(), &tool).unwrap();

        assert!(!report.is_success());
        assert!(tool.calls().len() <= 2);
        assert!(report.summary.not_dispatched >= 3);
        assert_eq!(report.status_of("fn-4"), Some(ItemStatus::NotDispatched));
    }

    #[test]
    fn dockerfile_shrinkwrap_does_not_invoke_tool() {
        let (_dir, config) = setup();
        let tool = RecordingTool::default();
        let options = BuildOptions {
            shrinkwrap: true,
            ..BuildOptions::default()
        };

        let report = build(
            &config,
            &[function("magick", "Dockerfile", "/nonexistent/handler")],
            1,
            options,
            &tool,
        )
        .unwrap();

        assert!(report.is_success());
        assert_eq!(report.status_of("magick"), Some(ItemStatus::Shrinkwrapped));
        assert!(tool.calls().is_empty());
    }

    #[test]
    fn dockerfile_builds_from_handler_directory() {
        let (dir, config) = setup();
        let h = handler(dir.path(), "magick", &[("Dockerfile", "FROM alpine")]);
        let tool = RecordingTool::default();

        let outcome =
            build_single(&config, &function("magick", "dockerfile", &h), BuildOptions::default(), &tool)
                .unwrap();

        assert_eq!(outcome.status, ItemStatus::Built);
        assert_eq!(tool.calls()[0].0.as_deref(), Some(Path::new(&h)));
        assert!(!paths::build_context(config.workdir(), "magick").exists());
    }

    #[test]
    fn dockerfile_with_missing_handler_is_skipped() {
        let (_dir, config) = setup();
        let tool = RecordingTool::default();

        let report = build(
            &config,
            &[function("magick", "Dockerfile", "/nonexistent/handler")],
            1,
            BuildOptions::default(),
            &tool,
        )
        .unwrap();

        assert!(report.is_success());
        assert_eq!(report.status_of("magick"), Some(ItemStatus::Skipped));
        assert!(tool.calls().is_empty());
    }

    #[test]
    fn missing_language_is_skipped_without_failing_batch() {
        let (dir, config) = setup();
        let h = handler(dir.path(), "echo", &[("handler.py", "")]);
        let tool = RecordingTool::default();

        let report = build(
            &config,
            &[function("nolang", "", &h), function("echo", "python", &h)],
            2,
            BuildOptions::default(),
            &tool,
        )
        .unwrap();

        assert!(report.is_success());
        assert_eq!(report.status_of("nolang"), Some(ItemStatus::Skipped));
        assert_eq!(report.status_of("echo"), Some(ItemStatus::Built));
    }

    #[test]
    fn template_shrinkwrap_leaves_context_on_disk() {
        let (dir, config) = setup();
        let h = handler(dir.path(), "echo", &[("handler.py", "")]);
        let tool = RecordingTool::default();
        let options = BuildOptions {
            shrinkwrap: true,
            ..BuildOptions::default()
        };

        let outcome = build_single(&config, &function("echo", "python", &h), options, &tool).unwrap();

        assert_eq!(outcome.status, ItemStatus::Shrinkwrapped);
        assert!(paths::build_function(config.workdir(), "echo")
            .join("handler.py")
            .exists());
        assert!(tool.calls().is_empty());
    }

    #[test]
    fn unsupported_language_aborts_before_any_build() {
        let (dir, config) = setup();
        let h = handler(dir.path(), "echo", &[("handler.py", "")]);
        let tool = RecordingTool::default();

        let err = build(
            &config,
            &[function("echo", "python", &h), function("old", "cobol", &h)],
            2,
            BuildOptions::default(),
            &tool,
        )
        .unwrap_err();

        assert_eq!(err.code.as_str(), "template.language_unsupported");
        assert!(tool.calls().is_empty());
    }

    #[test]
    fn missing_handler_for_template_is_function_error() {
        let (_dir, config) = setup();
        let tool = RecordingTool::default();

        let report = build(
            &config,
            &[function("echo", "python", "/nonexistent/handler")],
            1,
            BuildOptions::default(),
            &tool,
        )
        .unwrap();

        let err = report.into_result().unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
        assert!(tool.calls().is_empty());
    }

    #[test]
    fn path_like_function_names_are_rejected() {
        let (dir, config) = setup();
        let h = handler(dir.path(), "echo", &[("handler.py", "")]);
        let tool = RecordingTool::default();

        for name in ["../escape", "a/b", ""] {
            let err = build_single(&config, &function(name, "python", &h), BuildOptions::default(), &tool)
                .unwrap_err();
            assert_eq!(err.code.as_str(), "config.invalid_value");
        }
    }
}
