//! Domain types shared across the judging core.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The closed set of terminal verdicts a submission can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    CompileError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    SystemError,
}

impl Verdict {
    /// The exact label persisted to `submit_records.result` and published
    /// on `judgeResults`.
    pub fn as_label(&self) -> &'static str {
        match self {
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::CompileError => "Compile Error",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::MemoryLimitExceeded => "Memory Limit Exceeded",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::SystemError => "System Error",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

/// A submission notification: `<user_id>_<problem_id>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTask {
    pub user_id: i64,
    pub problem_id: i64,
    /// The filename as staged in the shared code directory, e.g. `3_7.cpp`.
    pub filename: String,
}

impl SubmissionTask {
    /// Parse a broker message body of the form `"<user_id>_<problem_id>.<ext>"`.
    ///
    /// Splits once on `_` (left = user id), then splits the remainder once
    /// on `.` (left = problem id, right = extension). The whole body is
    /// also the filename staged in the code directory.
    pub fn parse(body: &str) -> Result<Self, crate::Error> {
        let (uid_part, rest) = body
            .split_once('_')
            .ok_or_else(|| crate::Error::MalformedTask(body.to_string()))?;
        let (pid_part, _ext) = rest
            .split_once('.')
            .ok_or_else(|| crate::Error::MalformedTask(body.to_string()))?;

        let user_id: i64 = uid_part
            .parse()
            .map_err(|_| crate::Error::MalformedTask(body.to_string()))?;
        let problem_id: i64 = pid_part
            .parse()
            .map_err(|_| crate::Error::MalformedTask(body.to_string()))?;

        Ok(Self {
            user_id,
            problem_id,
            filename: body.to_string(),
        })
    }

    /// The filename's extension (including the leading dot), e.g. `.cpp`.
    pub fn extension(&self) -> Option<&str> {
        let dot = self.filename.rfind('.')?;
        Some(&self.filename[dot..])
    }
}

/// A problem record as stored in `problems`. Fields beyond the limits are
/// opaque to the judging core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub pid: i64,
    /// Free-form string containing a positive integer count of seconds,
    /// e.g. `"1s"`, `"1000ms"`, `"time limit: 2"`.
    pub time_limit: String,
    /// Free-form string containing a positive integer count of megabytes.
    pub memory_limit: String,
}

impl Problem {
    /// Extract the first contiguous run of decimal digits from `time_limit`
    /// (seconds) and `memory_limit` (megabytes, converted to kilobytes).
    pub fn parse_limits(&self) -> Result<(u64, u64), crate::Error> {
        let time_limit_secs = first_digit_run(&self.time_limit)
            .ok_or_else(|| crate::Error::LimitParse(self.time_limit.clone()))?;
        let memory_limit_mb = first_digit_run(&self.memory_limit)
            .ok_or_else(|| crate::Error::LimitParse(self.memory_limit.clone()))?;
        Ok((time_limit_secs, memory_limit_mb * 1024))
    }
}

/// Extract the first contiguous run of decimal digits in `s` and parse it
/// as an integer. Returns `None` if `s` contains no digits.
///
/// Grounded on `parseLimits`' `regexp.MustCompile(`\d+`).FindAllString`
/// in the original Go source — ported to `regex` rather than a hand-rolled
/// scan so the matching behavior (and its edge cases around Unicode digit
/// classes) stays identical to the original.
pub fn first_digit_run(s: &str) -> Option<u64> {
    let re = Regex::new(r"[0-9]+").expect("static digit-run pattern is valid");
    re.find(s)?.as_str().parse().ok()
}

/// An ordered (input, expected-output) pair owned by a problem.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub input_data: Vec<u8>,
    pub expected_output: Vec<u8>,
}

/// A verdict result ready for persistence and publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMessage {
    pub user_id: i64,
    pub problem_id: i64,
    pub status: String,
}

impl ResultMessage {
    pub fn new(user_id: i64, problem_id: i64, verdict: Verdict) -> Self {
        Self {
            user_id,
            problem_id,
            status: verdict.as_label().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_task_body() {
        let task = SubmissionTask::parse("42_7.cpp").unwrap();
        assert_eq!(task.user_id, 42);
        assert_eq!(task.problem_id, 7);
        assert_eq!(task.filename, "42_7.cpp");
        assert_eq!(task.extension(), Some(".cpp"));
    }

    #[test]
    fn rejects_body_with_no_underscore() {
        assert!(SubmissionTask::parse("42.cpp").is_err());
    }

    #[test]
    fn rejects_body_with_no_dot() {
        assert!(SubmissionTask::parse("42_7").is_err());
    }

    #[test]
    fn rejects_non_numeric_ids() {
        assert!(SubmissionTask::parse("abc_7.cpp").is_err());
        assert!(SubmissionTask::parse("42_xyz.cpp").is_err());
    }

    #[test]
    fn first_digit_run_extracts_leading_number() {
        assert_eq!(first_digit_run("1s"), Some(1));
        assert_eq!(first_digit_run("time limit: 2 seconds"), Some(2));
        assert_eq!(first_digit_run("1000ms"), Some(1000));
        assert_eq!(first_digit_run("no digits here"), None);
    }

    #[test]
    fn parse_limits_converts_memory_to_kilobytes() {
        let problem = Problem {
            pid: 1,
            time_limit: "1s".to_string(),
            memory_limit: "64MB".to_string(),
        };
        let (secs, kb) = problem.parse_limits().unwrap();
        assert_eq!(secs, 1);
        assert_eq!(kb, 64 * 1024);
    }

    #[test]
    fn parse_limits_rejects_missing_digits() {
        let problem = Problem {
            pid: 1,
            time_limit: "fast".to_string(),
            memory_limit: "64MB".to_string(),
        };
        assert!(problem.parse_limits().is_err());
    }

    #[test]
    fn verdict_labels_match_closed_set() {
        assert_eq!(Verdict::Accepted.as_label(), "Accepted");
        assert_eq!(Verdict::WrongAnswer.as_label(), "Wrong Answer");
        assert_eq!(Verdict::CompileError.as_label(), "Compile Error");
        assert_eq!(Verdict::TimeLimitExceeded.as_label(), "Time Limit Exceeded");
        assert_eq!(
            Verdict::MemoryLimitExceeded.as_label(),
            "Memory Limit Exceeded"
        );
        assert_eq!(Verdict::RuntimeError.as_label(), "Runtime Error");
        assert_eq!(Verdict::SystemError.as_label(), "System Error");
    }
}
