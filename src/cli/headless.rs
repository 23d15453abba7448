//! Headless pipeline runner.
//!
//! Drives a [`Session`] from the first step to training using the same
//! validators and task functions as the wizard, printing progress to the
//! terminal instead of drawing it.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};

use super::prompts::confirm_step;
use crate::app::{NoticeLevel, Session};
use crate::pipeline::TaskKind;
use crate::report::RunSummary;
use crate::utils::{
    create_spinner, finish_with_success, finish_with_warning, print_banner, print_config,
    print_info, print_step_header, print_step_time, print_warning,
};
use crate::wizard::ForwardAction;

const POLL: Duration = Duration::from_millis(100);

/// Run every step of the session in order.
///
/// Returns `Ok(None)` when the user declines the training prompt.
pub fn run_headless(session: &mut Session, no_confirm: bool) -> Result<Option<RunSummary>> {
    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(session.config());

    let mut summary = RunSummary::default();
    let mut step_num = 0u8;

    loop {
        print_notices(session);
        let step = session.cursor().current();
        if !session.validation().ok {
            let fields: Vec<String> = session
                .validation()
                .marks
                .iter()
                .map(|f| format!("{f:?}"))
                .collect();
            bail!(
                "{} settings are incomplete or invalid: {}",
                step.title(),
                fields.join(", ")
            );
        }

        match session.cursor().forward_action() {
            ForwardAction::Advance => {
                session.next();
            }
            ForwardAction::EnterTraining => {
                if session.plot_enabled() {
                    step_num += 1;
                    print_step_header(step_num, TaskKind::Plot.label());
                    // A failed plot does not stop the run.
                    if let Err(e) = run_task(session, TaskKind::Plot, &mut summary) {
                        print_warning(&format!("{e:#}"));
                    }
                }
                session.next();
            }
            ForwardAction::Dispatch(kind) => {
                if kind == TaskKind::Train
                    && !no_confirm
                    && !confirm_step("Start training with these settings?")?
                {
                    print_info("Training skipped.");
                    return Ok(None);
                }
                step_num += 1;
                print_step_header(step_num, kind.label());
                run_task(session, kind, &mut summary)?;
                if kind == TaskKind::Train {
                    break;
                }
            }
        }
    }

    print_notices(session);
    summary.collect(session.results(), session.mapper());
    Ok(Some(summary))
}

/// Dispatch `kind` and wait for it, echoing training log lines as they come.
fn run_task(session: &mut Session, kind: TaskKind, summary: &mut RunSummary) -> Result<()> {
    let spinner = create_spinner(&format!("{}...", kind.label()));
    let started = Instant::now();

    let dispatched = match kind {
        TaskKind::Plot => session.plot(),
        _ => session.dispatch(kind),
    };
    if !dispatched {
        spinner.finish_and_clear();
        let reason = session
            .dismiss_notice()
            .map(|n| n.message)
            .unwrap_or_else(|| "the step is not ready".to_string());
        bail!("{} could not start: {reason}", kind.label());
    }

    let mut printed = 0;
    while session.busy() {
        session.tick();
        let lines = session.log_lines();
        for line in &lines[printed.min(lines.len())..] {
            spinner.println(format!("      {line}"));
        }
        printed = lines.len();
        thread::sleep(POLL);
    }
    session.tick();
    let lines = session.log_lines();
    for line in &lines[printed.min(lines.len())..] {
        spinner.println(format!("      {line}"));
    }

    let elapsed = started.elapsed();
    if let Some(failure) = session.dismiss_failure() {
        finish_with_warning(&spinner, &format!("{} failed", kind.label()));
        bail!("{} failed: {}", kind.label(), failure.message);
    }
    finish_with_success(&spinner, &format!("{} complete", kind.label()));
    print_step_time(elapsed);
    summary.record(kind, elapsed);
    Ok(())
}

fn print_notices(session: &mut Session) {
    while let Some(notice) = session.dismiss_notice() {
        for line in notice.message.lines().filter(|l| !l.trim().is_empty()) {
            match notice.level {
                NoticeLevel::Info => print_info(line),
                NoticeLevel::Warning | NoticeLevel::Error => print_warning(line),
            }
        }
    }
}
