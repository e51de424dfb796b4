use crate::builtin::Builtin;
use crate::env::Environment;
use crate::external::list_executables;
use crate::interpreter::PROMPT;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use std::cell::RefCell;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;

/// Outcome of one completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Insert `text` at the cursor; the cursor ends up at `cursor`.
    Insert { text: String, cursor: usize },
    /// Nothing to insert, ring the bell.
    Bell,
    /// Show every candidate below the prompt.
    List(Vec<String>),
}

/// Command-name completion with the "ring once, list on the second tab" behaviour.
#[derive(Debug, Clone, Default)]
pub struct AutoComplete {
    tab_count: u32,
    last_prefix: String,
    search_path: OsString,
    current_dir: PathBuf,
}

impl AutoComplete {
    pub fn new(search_path: impl Into<OsString>, current_dir: impl Into<PathBuf>) -> Self {
        Self {
            search_path: search_path.into(),
            current_dir: current_dir.into(),
            ..Self::default()
        }
    }

    /// Picks up the search path and working directory the next command would use.
    pub fn follow(&mut self, env: &Environment) {
        self.search_path = env.search_path();
        self.current_dir.clone_from(&env.current_dir);
    }

    pub fn tab_count(&self) -> u32 {
        self.tab_count
    }

    /// Builtin names and executables on the search path, sorted and without duplicates.
    pub fn candidates(&self) -> Vec<String> {
        let mut names: Vec<String> = Builtin::ALL
            .iter()
            .map(|builtin| builtin.name().to_string())
            .chain(list_executables(&self.search_path, &self.current_dir))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Advances the state machine for a tab press with the cursor at byte `pos` of `line`.
    pub fn complete(&mut self, line: &str, pos: usize) -> Completion {
        let prefix = line.get(..pos).unwrap_or(line);
        if prefix == self.last_prefix {
            self.tab_count += 1;
        } else {
            self.last_prefix = prefix.to_string();
            self.tab_count = 1;
        }

        let matches: Vec<String> = self
            .candidates()
            .into_iter()
            .filter(|name| name.len() > prefix.len() && name.starts_with(prefix))
            .collect();
        let suffixes: Vec<&str> = matches.iter().map(|name| &name[prefix.len()..]).collect();
        log::trace!(
            "completing {prefix:?}: {} matches, tab {}",
            matches.len(),
            self.tab_count
        );

        let insert = match suffixes.as_slice() {
            [] => return Completion::Bell,
            [only] => Some(*only),
            many => common_suffix(many),
        };
        match insert {
            Some(suffix) => {
                let text = format!("{suffix} ");
                Completion::Insert {
                    cursor: pos + text.len(),
                    text,
                }
            }
            None if self.tab_count < 2 => Completion::Bell,
            None => {
                self.tab_count = 0;
                Completion::List(matches)
            }
        }
    }
}

/// The shortest suffix, if every other suffix contains it.
///
/// Unlike a longest common prefix, this only fires when one candidate's remainder is
/// embedded in all the others, e.g. `foo` and `foo_bar`.
fn common_suffix<'a>(suffixes: &[&'a str]) -> Option<&'a str> {
    if suffixes.len() < 2 {
        return None;
    }
    let shortest = suffixes.iter().copied().min_by_key(|suffix| suffix.len())?.trim();
    (!shortest.is_empty() && suffixes.iter().all(|suffix| suffix.contains(shortest)))
        .then_some(shortest)
}

/// Adapter plugging [`AutoComplete`] into the line editor.
pub struct ShellHelper {
    engine: RefCell<AutoComplete>,
}

impl ShellHelper {
    pub fn new(engine: AutoComplete) -> Self {
        Self {
            engine: RefCell::new(engine),
        }
    }

    pub fn engine_mut(&mut self) -> &mut AutoComplete {
        self.engine.get_mut()
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        match self.engine.borrow_mut().complete(line, pos) {
            Completion::Insert { text, .. } => Ok((
                pos,
                vec![Pair {
                    display: text.clone(),
                    replacement: text,
                }],
            )),
            // An empty candidate list makes the editor beep.
            Completion::Bell => Ok((pos, Vec::new())),
            Completion::List(names) => {
                let mut out = io::stdout().lock();
                write!(out, "\r\n{}\r\n{PROMPT}{line}", names.join("  "))?;
                out.flush()?;
                Ok((pos, Vec::new()))
            }
        }
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::external::tests::touch;
    use tempfile::TempDir;

    fn engine_with(executables: &[&str]) -> (TempDir, AutoComplete) {
        let dir = tempfile::tempdir().unwrap();
        for name in executables {
            touch(dir.path(), name, 0o755);
        }
        let engine = AutoComplete::new(dir.path().as_os_str(), "/");
        (dir, engine)
    }

    #[test]
    fn completes_builtin() {
        let (_dir, mut engine) = engine_with(&[]);
        assert_eq!(
            engine.complete("ech", 3),
            Completion::Insert {
                text: "o ".to_string(),
                cursor: 5,
            }
        );
    }

    #[test]
    fn completes_executable_from_search_path() {
        let (_dir, mut engine) = engine_with(&["custom_exe_1234"]);
        assert_eq!(
            engine.complete("custom", 6),
            Completion::Insert {
                text: "_exe_1234 ".to_string(),
                cursor: 16,
            }
        );
    }

    #[test]
    fn no_match_rings() {
        let (_dir, mut engine) = engine_with(&[]);
        assert_eq!(engine.complete("zzz_nothing", 11), Completion::Bell);
    }

    #[test]
    fn exact_match_is_not_a_candidate() {
        let (_dir, mut engine) = engine_with(&[]);
        assert_eq!(engine.complete("echo", 4), Completion::Bell);
    }

    #[test]
    fn ring_then_list() {
        let (_dir, mut engine) = engine_with(&["tool_alpha", "tool_beta"]);

        assert_eq!(engine.complete("tool_", 5), Completion::Bell);
        assert_eq!(engine.tab_count(), 1);

        assert_eq!(
            engine.complete("tool_", 5),
            Completion::List(vec!["tool_alpha".to_string(), "tool_beta".to_string()])
        );
        assert_eq!(engine.tab_count(), 0);

        // The cycle starts over.
        assert_eq!(engine.complete("tool_", 5), Completion::Bell);
    }

    #[test]
    fn new_prefix_resets_tab_count() {
        let (_dir, mut engine) = engine_with(&["tool_alpha", "tool_beta"]);

        assert_eq!(engine.complete("tool_", 5), Completion::Bell);
        assert_eq!(engine.complete("tool", 4), Completion::Bell);
        assert_eq!(engine.tab_count(), 1);
    }

    #[test]
    fn embedded_common_suffix_is_inserted() {
        let (_dir, mut engine) = engine_with(&["xyz_foo", "xyz_foo_bar", "xyz_foo_bar_baz"]);

        assert_eq!(
            engine.complete("xyz_", 4),
            Completion::Insert {
                text: "foo ".to_string(),
                cursor: 8,
            }
        );
    }

    #[test]
    fn candidates_are_sorted_and_unique() {
        let (dir, _) = engine_with(&["echo", "aaa_first"]);
        let search_path = std::env::join_paths([dir.path(), dir.path()]).unwrap();
        let candidates = AutoComplete::new(search_path, "/").candidates();

        assert_eq!(candidates.first().map(String::as_str), Some("aaa_first"));
        assert_eq!(candidates.iter().filter(|name| *name == "echo").count(), 1);
        let mut sorted = candidates.clone();
        sorted.sort();
        assert_eq!(candidates, sorted);
    }

    #[test]
    fn repeated_requests_are_stable() {
        let (_dir, mut engine) = engine_with(&["stable_tool"]);
        let first = engine.complete("stable", 6);
        assert_eq!(engine.tab_count(), 1);
        let second = engine.complete("stable", 6);
        assert_eq!(engine.tab_count(), 2);
        assert_eq!(first, second);
        assert_eq!(
            second,
            Completion::Insert {
                text: "_tool ".to_string(),
                cursor: 12,
            }
        );
    }

    #[test]
    fn relative_search_path_follows_cd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("bin")).unwrap();
        touch(&dir.path().join("bin"), "here_only_tool", 0o755);
        let mut env = Environment::isolated("/", "bin");
        let mut engine = AutoComplete::new(env.search_path(), &env.current_dir);
        assert_eq!(engine.complete("here_only", 9), Completion::Bell);

        env.current_dir = dir.path().to_path_buf();
        engine.follow(&env);
        assert_eq!(
            engine.complete("here_only", 9),
            Completion::Insert {
                text: "_tool ".to_string(),
                cursor: 15,
            }
        );
    }
}
