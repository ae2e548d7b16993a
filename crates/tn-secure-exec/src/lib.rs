//! Secure Exec (spec §4.1) — the only path by which the agent invokes
//! programs that mutate the kernel network stack. This is the injection
//! defense bottleneck: every argument is classified before the process is
//! ever spawned.

pub mod error;
pub mod registry;

pub use error::CommandError;
pub use registry::{lookup, ArgsValidator, CommandSpec};

use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tn_validators::sanitize_for_log;

/// Tokens containing any of these are rejected before pattern matching runs,
/// regardless of the command (spec §4.1, "Token classification").
const DANGEROUS_CHARS: &[char] = &[';', '&', '|', '`', '$', '(', ')', '<', '>', '"', '\'', '\\'];

/// Cap on combined stdout+stderr capture (spec §4.1 `OutputOversize`).
const OUTPUT_CAP: usize = 1 << 20;

/// Fixed, scrubbed environment for every invocation (spec §4.1 "Execution").
const FIXED_PATH: &str = "/usr/sbin:/usr/bin:/sbin:/bin";

#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub combined: String,
    pub exit_code: Option<i32>,
}

fn classify_token(index: usize, token: &str, spec: &CommandSpec) -> Result<(), CommandError> {
    if token.is_empty() {
        if spec.allow_empty_tokens {
            return Ok(());
        }
        return Err(CommandError::ArgRejected {
            index,
            reason: "empty argument not permitted for this command".into(),
        });
    }

    if token.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
        return Err(CommandError::ArgRejected {
            index,
            reason: "contains a shell metacharacter".into(),
        });
    }

    if spec.allowed_flags.contains(&token) {
        return Ok(());
    }

    if spec.patterns.iter().any(|p| p.is_match(token)) {
        return Ok(());
    }

    Err(CommandError::ArgRejected {
        index,
        reason: "matches neither an allowed flag nor a registered pattern".into(),
    })
}

/// Validate `args` against `spec` without spawning anything. Exposed
/// separately so callers (e.g. the Control API) can reject a request with a
/// 400 before any process touches the system.
pub fn validate_args(spec: &CommandSpec, args: &[String]) -> Result<(), CommandError> {
    if args.len() > spec.max_args {
        return Err(CommandError::ArgCountExceeded {
            got: args.len(),
            max: spec.max_args,
        });
    }
    for (i, arg) in args.iter().enumerate() {
        classify_token(i, arg, spec)?;
    }
    if let Some(validator) = spec.validator {
        validator(args).map_err(|reason| CommandError::ArgRejected { index: 0, reason })?;
    }
    Ok(())
}

/// Run `command` with `args`, enforcing `deadline` as a wall-clock timeout
/// in addition to the command's own registered max.
pub async fn execute(
    command: &str,
    args: &[String],
    deadline: Duration,
) -> Result<ExecOutput, CommandError> {
    let spec = lookup(command)
        .ok_or_else(|| CommandError::CommandNotAllowed(command.to_string()))?;

    validate_args(spec, args)?;

    let effective_deadline = deadline.min(spec.max_wall_clock);

    tracing::debug!(
        command = spec.name,
        args = %sanitize_for_log(&args.join(" ")),
        "secure_exec: spawning"
    );

    let mut child = Command::new(spec.name)
        .args(args)
        .env_clear()
        .env("PATH", FIXED_PATH)
        .env("LANG", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CommandError::Spawn(e.to_string()))?;

    let mut stdout = child.stdout.take().expect("piped stdout");
    let mut stderr = child.stderr.take().expect("piped stderr");

    let read_and_wait = async {
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let (out_res, err_res, status) = tokio::join!(
            stdout.read_to_end(&mut out_buf),
            stderr.read_to_end(&mut err_buf),
            child.wait(),
        );
        out_res.ok();
        err_res.ok();
        let status = status.map_err(|e| CommandError::Spawn(e.to_string()))?;
        Ok::<_, CommandError>((out_buf, err_buf, status))
    };

    let (out_buf, err_buf, status) = match timeout(effective_deadline, read_and_wait).await {
        Ok(result) => result?,
        Err(_) => {
            let _ = child.start_kill();
            return Err(CommandError::Timeout(effective_deadline));
        }
    };

    if out_buf.len() + err_buf.len() > OUTPUT_CAP {
        return Err(CommandError::OutputOversize { cap: OUTPUT_CAP });
    }

    let mut combined = String::from_utf8_lossy(&out_buf).into_owned();
    combined.push_str(&String::from_utf8_lossy(&err_buf));

    if !status.success() {
        tracing::warn!(
            command = spec.name,
            exit_code = ?status.code(),
            stderr = %sanitize_for_log(&String::from_utf8_lossy(&err_buf)),
            "secure_exec: non-zero exit"
        );
        return Err(CommandError::ExecFailed {
            exit_code: status.code(),
            captured_stderr: String::from_utf8_lossy(&err_buf).into_owned(),
        });
    }

    Ok(ExecOutput {
        combined,
        exit_code: status.code(),
    })
}

/// Spawn `command` with `args` as a long-lived, tracked child process —
/// the probe-server lifecycle (spec §4.5) needs a handle it can hold onto
/// and kill later, rather than Secure Exec's usual wait-for-completion
/// contract. Subject to the same allowlist, token classification, and
/// scrubbed environment as [`execute`]; there is no separate code path for
/// invoking registered programs.
pub async fn spawn_background(
    command: &str,
    args: &[String],
) -> Result<tokio::process::Child, CommandError> {
    let spec = lookup(command)
        .ok_or_else(|| CommandError::CommandNotAllowed(command.to_string()))?;

    validate_args(spec, args)?;

    tracing::debug!(
        command = spec.name,
        args = %sanitize_for_log(&args.join(" ")),
        "secure_exec: spawning background process"
    );

    Command::new(spec.name)
        .args(args)
        .env_clear()
        .env("PATH", FIXED_PATH)
        .env("LANG", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CommandError::Spawn(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unregistered_command() {
        let spec = lookup("rm");
        assert!(spec.is_none());
    }

    #[tokio::test]
    async fn closure_rejects_every_unregistered_command() {
        // spec §8 "Command allowlist closure": any name outside the set
        // registered in §6 must fail with CommandNotAllowed regardless of args.
        for name in ["rm", "bash", "sh", "curl", "nc", "python3", ""] {
            let err = execute(name, &[], Duration::from_secs(1)).await.unwrap_err();
            assert!(matches!(err, CommandError::CommandNotAllowed(_)));
        }
    }

    #[test]
    fn rejects_injection_characters() {
        let spec = lookup("ping").unwrap();
        let args = vec!["-c".to_string(), "3".to_string(), "10.0.0.1; rm -rf /".to_string()];
        assert!(validate_args(spec, &args).is_err());
    }

    #[test]
    fn rejects_too_many_args() {
        let spec = lookup("ping").unwrap();
        let args: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        assert!(matches!(
            validate_args(spec, &args),
            Err(CommandError::ArgCountExceeded { .. })
        ));
    }

    #[test]
    fn iperf3_requires_server_or_client_not_both() {
        let spec = lookup("iperf3").unwrap();
        let neither: Vec<String> = vec!["-p".into(), "5201".into()];
        assert!(validate_args(spec, &neither).is_err());

        let both: Vec<String> = vec!["-s".into(), "-c".into(), "10.0.0.2".into()];
        assert!(validate_args(spec, &both).is_err());

        let client: Vec<String> = vec!["-c".into(), "10.0.0.2".into(), "-p".into(), "5201".into()];
        assert!(validate_args(spec, &client).is_ok());
    }

    #[test]
    fn accepts_valid_tc_invocation() {
        let spec = lookup("tc").unwrap();
        let args: Vec<String> = vec![
            "qdisc", "add", "dev", "eth0", "root", "handle", "1:", "htb", "default", "30",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert!(validate_args(spec, &args).is_ok());
    }
}
