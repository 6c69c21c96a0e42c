//! The six-language dispatch table, character-identical to the command
//! templates in `spec.md` §4.C (and the original's `buildRunCommand`/the
//! `switch ext` block in `core.go`), including the Java
//! `-Xms/-Xmx/-XX:MaxRAMPercentage=80.0` heuristic flagged in `spec.md` §9
//! as known-imperfect and kept anyway.

/// A supported source-file extension, including the leading dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Cpp,
    Java,
    Rust,
    Python,
    Php,
    Pascal,
}

impl Language {
    /// Map a filename extension (including the leading dot) to a language.
    /// Returns `None` for anything outside the closed set of six.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".cpp" => Some(Self::Cpp),
            ".java" => Some(Self::Java),
            ".rs" => Some(Self::Rust),
            ".py" => Some(Self::Python),
            ".php" => Some(Self::Php),
            ".pas" => Some(Self::Pascal),
            _ => None,
        }
    }

    /// Shell fragments to run, in order, inside the container to compile
    /// the staged source. A non-zero exit from any step is a Compile
    /// Error. Empty for interpreted languages.
    pub fn compile_steps(&self, task_dir: &str, filename: &str, stem: &str) -> Vec<String> {
        match self {
            Self::Cpp => vec![format!("g++ {task_dir}/{filename} -o {task_dir}/{filename}.out")],
            Self::Java => vec![
                format!("mv {task_dir}/{filename} {task_dir}/Main.java"),
                format!("javac {task_dir}/Main.java"),
            ],
            Self::Rust => vec![format!("rustc {task_dir}/{filename} -o {task_dir}/{stem}")],
            Self::Python => Vec::new(),
            Self::Php => vec![format!("php -l {task_dir}/{filename}")],
            Self::Pascal => vec![format!(
                "fpc -v0 -O2 {task_dir}/{filename} -o{task_dir}/{stem}"
            )],
        }
    }

    /// The shell fragment that runs one test case, bounding memory with
    /// `ulimit -v` and wall-clock time with the inner `timeout -s SIGKILL`.
    pub fn run_command(
        &self,
        task_dir: &str,
        filename: &str,
        stem: &str,
        time_limit_secs: u64,
        memory_limit_kb: u64,
    ) -> String {
        match self {
            Self::Cpp => format!(
                "ulimit -v {memory_limit_kb} && timeout -s SIGKILL {time_limit_secs}s {task_dir}/{filename}.out"
            ),
            Self::Java => {
                let heap_mb = (memory_limit_kb / 1024).max(32);
                format!(
                    "ulimit -v {memory_limit_kb} && timeout -s SIGKILL {time_limit_secs}s java -cp {task_dir} -Xms{heap_mb}m -Xmx{heap_mb}m -XX:MaxRAMPercentage=80.0 Main"
                )
            }
            Self::Rust | Self::Pascal => format!(
                "ulimit -v {memory_limit_kb} && timeout -s SIGKILL {time_limit_secs}s {task_dir}/{stem}"
            ),
            Self::Python => format!(
                "ulimit -v {memory_limit_kb} && timeout -s SIGKILL {time_limit_secs}s python {task_dir}/{filename}"
            ),
            Self::Php => format!(
                "ulimit -v {memory_limit_kb} && timeout -s SIGKILL {time_limit_secs}s php {task_dir}/{filename}"
            ),
        }
    }
}
