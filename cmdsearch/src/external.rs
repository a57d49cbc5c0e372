use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::criteria::SearchCriteria;
use crate::errors::{SearchError, SearchResult};
use crate::filter::PatternSyntax;
use crate::results::FoundFile;
use crate::walker::{SearchMessage, WalkOutcome};

const FIND_COMMAND: &str = "find";
const GREP_COMMAND: &str = "grep";

/// Builds the `find` invocation equivalent to `criteria`.
///
/// Name tests are always case-insensitive here. A glob without any
/// wildcard is turned into a substring match.
pub fn build_find_command(criteria: &SearchCriteria, start_dir: &Path) -> Command {
    let mut command = Command::new(FIND_COMMAND);

    // exclude the start directory itself
    command.arg(start_dir).args(["-mindepth", "1"]);

    if !criteria.is_unlimited() {
        command
            .arg("-maxdepth")
            .arg((criteria.max_depth + 1).to_string());
    }

    let pattern = &criteria.name_pattern;
    if !pattern.is_empty() {
        match criteria.syntax {
            PatternSyntax::Glob => {
                if pattern.contains('*') || pattern.contains('?') {
                    command.arg("-iname").arg(pattern);
                } else {
                    command.arg("-iname").arg(format!("*{}*", pattern));
                }
            }
            PatternSyntax::Regex => {
                command
                    .args(["-regextype", "posix-extended", "-iregex"])
                    .arg(format!(".*/.*{}.*", pattern));
            }
        }
    }

    if let Some(text) = criteria.content_search() {
        command
            .args(["!", "-type", "p", "-exec", GREP_COMMAND, "-E", "-q"]);
        if !criteria.match_case {
            command.arg("-i");
        }
        command.arg(text).arg("{}").arg(";");
    }

    command.arg("-print");
    command
}

/// Runs `find` and reports each printed path as a match.
///
/// Reading happens on the calling thread; a raised `stop` kills the child.
pub fn run_external_search(
    criteria: &SearchCriteria,
    root: &Path,
    stop: &AtomicBool,
    on_message: &mut dyn FnMut(SearchMessage),
) -> SearchResult<WalkOutcome> {
    if !root.is_dir() {
        return Err(SearchError::file_not_found(root));
    }

    let mut command = build_find_command(criteria, root);
    debug!("running: {:?}", command);

    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(SearchError::IoError)?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SearchError::config_error("Child process has no stdout stream"))?;

    on_message(SearchMessage::Status(format!(
        "Searching in: {}",
        root.display()
    )));

    let mut outcome = WalkOutcome::default();
    let mut seen_dirs = HashSet::new();

    for line in BufReader::new(stdout).lines() {
        if stop.load(Ordering::Relaxed) {
            outcome.stopped = true;
            if let Err(e) = child.kill() {
                debug!("search command already gone: {}", e);
            }
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                debug!("search command output error: {}", e);
                continue;
            }
        };

        let path = PathBuf::from(&line);
        let metadata = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => continue,
            Err(e) => {
                warn!("Cannot stat a path '{}': {}", line, e);
                continue;
            }
        };

        if let Some(parent) = path.parent() {
            if seen_dirs.insert(parent.to_path_buf()) {
                outcome.match_dirs.push(parent.to_path_buf());
            }
        }
        outcome.matches += 1;
        on_message(SearchMessage::Found(FoundFile::new(path, &metadata)));
    }

    match child.wait() {
        Ok(status) if status.success() => debug!("search command finished successfully"),
        Ok(status) if outcome.stopped => debug!("search command stopped: {}", status),
        Ok(status) => warn!("search command finished with a status {}", status),
        Err(e) => warn!("search command failed with an error: {}", e),
    }

    info!(
        "External search of {} found {} matches",
        root.display(),
        outcome.matches
    );
    Ok(outcome)
}
