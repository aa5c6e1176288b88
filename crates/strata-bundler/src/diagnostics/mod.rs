//! Build diagnostics registry.
//!
//! Every stage of the pipeline reports through one [`Diagnostics`] object
//! instead of returning errors for recoverable problems. The registry owns a
//! catalogue of typed messages, accumulates entries per symbolic name and in
//! one ordered log, echoes the "pacified" subset immediately, and answers the
//! only question that decides whether a build succeeded: [`Diagnostics::error_count`].
//!
//! ```
//! use strata_bundler::diagnostics::{Diagnostics, Severity};
//!
//! let diagnostics = Diagnostics::new();
//! diagnostics.log("amdMissingDependency", ["module", "app/gone"]);
//! assert_eq!(diagnostics.error_count(), 1);
//! assert_eq!(diagnostics.entries()[0].severity, Severity::Error);
//! assert!(diagnostics.non_report_messages().contains("module: app/gone"));
//! ```

mod catalogue;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::Serialize;

use catalogue::{CATALOGUE, EXTRA_PACIFIED, LAST_REPORT_ID, LAST_USER_ID};

/// Severity band a message code falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Report,
    /// Outside every band (custom codes above 499).
    Other,
}

impl Severity {
    /// Bands are inclusive at both ends.
    pub fn from_code(code: u32) -> Self {
        match code {
            100..=199 => Severity::Info,
            200..=299 => Severity::Warning,
            300..=399 => Severity::Error,
            400..=499 => Severity::Report,
            _ => Severity::Other,
        }
    }

    fn prefix(self, code: u32) -> String {
        match self {
            Severity::Info => format!("info({code})"),
            Severity::Warning => format!("warn({code})"),
            Severity::Error => format!("error({code})"),
            Severity::Report => String::new(),
            Severity::Other => format!("message-id({code})"),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Report => "report",
            Severity::Other => "other",
        })
    }
}

/// One logged occurrence of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticEntry {
    pub severity: Severity,
    pub code: u32,
    pub name: String,
    pub args: Vec<String>,
}

impl DiagnosticEntry {
    /// Arguments rendered as `k: v; k: v`. A single argument is rendered as is.
    pub fn format_args(&self) -> String {
        format_args_list(&self.args)
    }
}

impl fmt::Display for DiagnosticEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.severity.prefix(self.code), self.name)?;
        if !self.args.is_empty() {
            write!(f, " {}", self.format_args())?;
        }
        Ok(())
    }
}

fn format_args_list(args: &[String]) -> String {
    if args.len() == 1 {
        return args[0].clone();
    }
    let mut out = String::new();
    let mut iter = args.chunks(2).peekable();
    while let Some(pair) = iter.next() {
        out.push_str(&pair[0]);
        if let Some(value) = pair.get(1) {
            out.push_str(": ");
            out.push_str(value);
        }
        if iter.peek().is_some() {
            out.push_str("; ");
        }
    }
    out
}

/// Live subscriber invoked for every logged entry.
pub type Listener = Arc<dyn Fn(&DiagnosticEntry) + Send + Sync>;

#[derive(Debug)]
struct Message {
    order: u32,
    code: u32,
    name: String,
    template: String,
    occurrences: Vec<Vec<String>>,
}

struct State {
    messages: Vec<Message>,
    pacified: FxHashSet<String>,
    last_report_id: u32,
    last_user_id: u32,
    warn_count: usize,
    error_count: usize,
    log: Vec<DiagnosticEntry>,
    optimizer_output: String,
    listeners: Vec<Listener>,
}

impl State {
    fn position(&self, name: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.name == name)
    }

    fn insert(&mut self, order: u32, code: u32, name: &str, template: &str) {
        if let Some(idx) = self.position(name) {
            self.messages.remove(idx);
        }
        let idx = self
            .messages
            .iter()
            .position(|m| m.order > order)
            .unwrap_or(self.messages.len());
        self.messages.insert(
            idx,
            Message {
                order,
                code,
                name: name.to_string(),
                template: template.to_string(),
                occurrences: Vec::new(),
            },
        );
    }
}

/// Registry of build diagnostics, shared between stages via `Arc`.
pub struct Diagnostics {
    state: Mutex<State>,
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Diagnostics")
            .field("entries", &state.log.len())
            .field("warnings", &state.warn_count)
            .field("errors", &state.error_count)
            .finish()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Fresh registry holding the full catalogue.
    ///
    /// Every warning and error is pacified, plus `packageVersion` and `signoff`.
    pub fn new() -> Self {
        let mut state = State {
            messages: Vec::with_capacity(CATALOGUE.len()),
            pacified: FxHashSet::default(),
            last_report_id: LAST_REPORT_ID,
            last_user_id: LAST_USER_ID,
            warn_count: 0,
            error_count: 0,
            log: Vec::new(),
            optimizer_output: String::new(),
            listeners: Vec::new(),
        };
        for &(order, code, name, template) in CATALOGUE {
            state.insert(order, code, name, template);
            if matches!(Severity::from_code(code), Severity::Warning | Severity::Error) {
                state.pacified.insert(name.to_string());
            }
        }
        for name in EXTRA_PACIFIED {
            state.pacified.insert((*name).to_string());
        }
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a listener that receives every entry as it is logged.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&DiagnosticEntry) + Send + Sync + 'static,
    {
        self.state.lock().listeners.push(Arc::new(listener));
    }

    /// Add (or replace) a message. Messages are kept sorted by `order`;
    /// equal orders keep registration order.
    pub fn register(&self, order: u32, code: u32, name: &str, template: &str, pacify: bool) {
        let mut state = self.state.lock();
        state.insert(order, code, name, template);
        if pacify {
            state.pacified.insert(name.to_string());
        }
    }

    /// Allocate a code for a custom message.
    pub fn new_message_id(&self, report: bool) -> u32 {
        let mut state = self.state.lock();
        if report {
            state.last_report_id += 1;
            state.last_report_id
        } else {
            state.last_user_id += 1;
            state.last_user_id
        }
    }

    pub fn set_pacified(&self, name: &str, pacified: bool) {
        let mut state = self.state.lock();
        if pacified {
            state.pacified.insert(name.to_string());
        } else {
            state.pacified.remove(name);
        }
    }

    pub fn is_pacified(&self, name: &str) -> bool {
        self.state.lock().pacified.contains(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.state.lock().position(name).is_some()
    }

    /// Append an entry for `name`.
    ///
    /// An unregistered name is recorded under `invalidMessageId` with the
    /// offending name prepended to the arguments; it never panics.
    pub fn log<I, S>(&self, name: &str, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args: Vec<String> = args.into_iter().map(Into::into).collect();
        let (entry, template, echo, listeners) = {
            let mut state = self.state.lock();
            let idx = match state.position(name) {
                Some(idx) => idx,
                None => {
                    args.insert(0, name.to_string());
                    args.insert(0, "id".to_string());
                    match state.position("invalidMessageId") {
                        Some(idx) => idx,
                        None => return,
                    }
                }
            };

            let message = &mut state.messages[idx];
            message.occurrences.push(args.clone());
            let entry = DiagnosticEntry {
                severity: Severity::from_code(message.code),
                code: message.code,
                name: message.name.clone(),
                args,
            };
            let template = message.template.clone();

            match entry.severity {
                Severity::Warning => state.warn_count += 1,
                Severity::Error => state.error_count += 1,
                _ => {}
            }
            state.log.push(entry.clone());
            let echo = state.pacified.contains(&entry.name);
            (entry, template, echo, state.listeners.clone())
        };

        if echo {
            echo_entry(&entry, &template);
        } else {
            tracing::debug!(code = entry.code, name = %entry.name, "{}", entry.format_args());
        }
        for listener in &listeners {
            listener(&entry);
        }
    }

    /// Echo free text immediately, recording it as a `pacify` entry.
    pub fn pacify(&self, text: &str) {
        self.log("pacify", [text]);
    }

    /// Every entry in the order it was logged.
    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.state.lock().log.clone()
    }

    /// Argument lists logged under `name`.
    pub fn occurrences(&self, name: &str) -> Vec<Vec<String>> {
        let state = self.state.lock();
        state
            .position(name)
            .map(|idx| state.messages[idx].occurrences.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, name: &str) -> usize {
        let state = self.state.lock();
        state
            .position(name)
            .map_or(0, |idx| state.messages[idx].occurrences.len())
    }

    /// Build transcript: every non-report message that was logged, grouped
    /// by message in catalogue order.
    pub fn non_report_messages(&self) -> String {
        let state = self.state.lock();
        let mut out = String::new();
        for message in &state.messages {
            let severity = Severity::from_code(message.code);
            if severity == Severity::Report || message.occurrences.is_empty() {
                continue;
            }
            out.push_str(&severity.prefix(message.code));
            out.push(' ');
            out.push_str(&message.template);
            out.push('\n');
            for args in &message.occurrences {
                out.push('\t');
                out.push_str(&format_args_list(args));
                out.push('\n');
            }
        }
        out
    }

    /// Structured summary: report-band messages only.
    pub fn report_messages(&self) -> String {
        let state = self.state.lock();
        let mut out = String::new();
        for message in &state.messages {
            if Severity::from_code(message.code) != Severity::Report
                || message.occurrences.is_empty()
            {
                continue;
            }
            out.push_str("\n\n");
            out.push_str(&message.template);
            out.push('\n');
            for args in &message.occurrences {
                out.push('\t');
                out.push_str(&format_args_list(args));
                out.push('\n');
            }
        }
        out
    }

    pub fn warn_count(&self) -> usize {
        self.state.lock().warn_count
    }

    /// The pass/fail gate for a build: zero means success.
    pub fn error_count(&self) -> usize {
        self.state.lock().error_count
    }

    /// Collect raw output from a compressor backend.
    pub fn log_optimizer_output(&self, text: &str) {
        self.state.lock().optimizer_output.push_str(text);
    }

    pub fn optimizer_output(&self) -> String {
        self.state.lock().optimizer_output.clone()
    }

    /// Clear every logged entry and counter. Registrations, the pacify set
    /// and listeners survive.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        for message in &mut state.messages {
            message.occurrences.clear();
        }
        state.log.clear();
        state.warn_count = 0;
        state.error_count = 0;
        state.optimizer_output.clear();
    }
}

fn echo_entry(entry: &DiagnosticEntry, template: &str) {
    let prefix = entry.severity.prefix(entry.code);
    let args = entry.format_args();
    match entry.severity {
        Severity::Error => tracing::error!("{prefix} {template} {args}"),
        Severity::Warning => tracing::warn!("{prefix} {template} {args}"),
        _ => tracing::info!("{prefix} {template} {args}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_are_inclusive() {
        assert_eq!(Severity::from_code(100), Severity::Info);
        assert_eq!(Severity::from_code(199), Severity::Info);
        assert_eq!(Severity::from_code(200), Severity::Warning);
        assert_eq!(Severity::from_code(399), Severity::Error);
        assert_eq!(Severity::from_code(400), Severity::Report);
        assert_eq!(Severity::from_code(499), Severity::Report);
        assert_eq!(Severity::from_code(501), Severity::Other);
    }

    #[test]
    fn counts_follow_severity() {
        let d = Diagnostics::new();
        d.log("optimize", ["layer", "app/main"]);
        d.log("dojoHasUnresolvedMid", ["feature", "x"]);
        d.log("amdCircularDependency", ["from", "a", "to", "b"]);
        d.log("hasReport", ["layer", "app/main"]);
        assert_eq!(d.warn_count(), 1);
        assert_eq!(d.error_count(), 1);
        assert_eq!(d.entries().len(), 4);
        assert_eq!(d.count("amdCircularDependency"), 1);
    }

    #[test]
    fn unknown_name_falls_back_to_invalid_message_id() {
        let d = Diagnostics::new();
        d.log("noSuchThing", ["a", "b"]);
        assert_eq!(
            d.occurrences("invalidMessageId"),
            vec![vec!["id".to_string(), "noSuchThing".into(), "a".into(), "b".into()]]
        );
        assert_eq!(d.error_count(), 1);
    }

    #[test]
    fn formats_argument_pairs() {
        let list = |v: &[&str]| format_args_list(&v.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        assert_eq!(list(&["only"]), "only");
        assert_eq!(list(&["k", "v"]), "k: v");
        assert_eq!(list(&["a", "1", "b", "2"]), "a: 1; b: 2");
        assert_eq!(list(&["a", "1", "dangling"]), "a: 1; dangling");
        assert_eq!(list(&[]), "");
    }

    #[test]
    fn transcript_and_report_views_are_disjoint() {
        let d = Diagnostics::new();
        d.log("amdMissingDependency", ["module", "app/gone"]);
        d.log("hasReport", ["features", "dom, host-browser"]);

        let transcript = d.non_report_messages();
        assert_eq!(transcript, "error(311) Missing dependency.\n\tmodule: app/gone\n");
        assert!(!transcript.contains("Has Features"));

        let report = d.report_messages();
        assert_eq!(report, "\n\nHas Features Detected\n\tfeatures: dom, host-browser\n");
    }

    #[test]
    fn default_pacify_set() {
        let d = Diagnostics::new();
        assert!(d.is_pacified("amdMissingDependency"));
        assert!(d.is_pacified("configUndeclaredPackage"));
        assert!(d.is_pacified("packageVersion"));
        assert!(d.is_pacified("signoff"));
        assert!(d.is_pacified("pacify"));
        assert!(!d.is_pacified("optimize"));
        d.set_pacified("optimize", true);
        assert!(d.is_pacified("optimize"));
    }

    #[test]
    fn custom_messages_are_ordered_and_numbered() {
        let d = Diagnostics::new();
        assert_eq!(d.new_message_id(true), 401);
        assert_eq!(d.new_message_id(false), 501);
        assert_eq!(d.new_message_id(false), 502);

        d.register(2, 401, "layerSizes", "Layer sizes", false);
        d.log("layerSizes", ["app/main", "1024"]);
        d.log("signoff", ["errors", "0"]);
        // order 2 sorts before signoff (order 3)
        let report = d.report_messages();
        let sizes = report.find("Layer sizes").unwrap();
        let signoff = report.find("Process completed").unwrap();
        assert!(sizes < signoff);
    }

    #[test]
    fn listeners_see_entries_live() {
        let d = Diagnostics::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        d.subscribe(move |e| sink.lock().push(e.name.clone()));
        d.log("optimize", ["x"]);
        d.log("writeFailed", ["path", "/out/x.js"]);
        assert_eq!(*seen.lock(), vec!["optimize", "writeFailed"]);
    }

    #[test]
    fn pacify_records_an_info_entry() {
        let d = Diagnostics::new();
        d.pacify("base package resolved against the working directory");
        let entries = d.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "pacify");
        assert_eq!(entries[0].severity, Severity::Info);
        assert_eq!(entries[0].args, vec!["base package resolved against the working directory"]);
        assert_eq!(d.warn_count() + d.error_count(), 0);
    }

    #[test]
    fn reset_clears_entries_but_keeps_registrations() {
        let d = Diagnostics::new();
        d.register(1, 600, "custom", "Custom.", false);
        d.log("custom", ["x"]);
        d.log("amdMissingDependency", ["m"]);
        d.log_optimizer_output("warning: x");
        d.reset();
        assert_eq!(d.error_count(), 0);
        assert!(d.entries().is_empty());
        assert!(d.non_report_messages().is_empty());
        assert!(d.optimizer_output().is_empty());
        assert!(d.is_registered("custom"));
    }
}
