//! Image push pipeline.
//!
//! Uses the same worker pool and first-error policy as the build pipeline:
//! after the first failed push no further functions are dispatched.

use crate::container::{self, ContainerTool};
use crate::error::{Error, Result};
use crate::manifest::FunctionSpec;
use crate::output::{BatchReport, ItemOutcome};
use crate::worker;

/// Push each function's image, in manifest order, on `concurrency` workers.
pub fn push(functions: &[FunctionSpec], concurrency: usize, tool: &dyn ContainerTool) -> BatchReport {
    let run = worker::run(functions, concurrency, "Pusher", |idx, spec| {
        push_function(spec, tool, idx)
    });
    let (slots, error) = run.by_index(functions.len());

    let mut report = BatchReport::new("push");
    for (spec, slot) in functions.iter().zip(slots) {
        match slot {
            Some(done) => match done.result {
                Ok(outcome) => report.record(&spec.name, Some(done.worker), outcome),
                Err(err) => report.record_error(&spec.name, Some(done.worker), &err),
            },
            None => report.record_not_dispatched(&spec.name),
        }
    }
    report.error = error;
    report
}

fn push_function(spec: &FunctionSpec, tool: &dyn ContainerTool, worker: usize) -> Result<ItemOutcome> {
    if spec.image.trim().is_empty() {
        log_status!(
            "push",
            "[{}] Please provide a valid image value in the YAML file for {}.",
            worker,
            spec.name
        );
        return Ok(ItemOutcome::skipped("no image"));
    }

    log_status!("push", "[{}] > Pushing: {}.", worker, spec.name);
    let args = container::push_args(&spec.image);
    let output = tool.run(None, &args);

    if !output.success {
        log_status!(
            "push",
            "[{}] Push of {} failed with exit code {}",
            worker,
            spec.image,
            output.exit_code
        );
        let details = container::failure_details(&spec.name, tool, &args, &output);
        return Err(container::exit_code_hint(
            Error::push_failed(details),
            output.exit_code,
        ));
    }

    log_status!("push", "[{}] < Pushed: {}.", worker, spec.image);
    Ok(ItemOutcome::pushed(&spec.image))
}
