//! Deterministic terminal command simulator.
//!
//! A pure function from command string to output string: fixed command
//! table, a tiny virtual file table for `cat`, and canned acknowledgements
//! for a handful of prefix-matched commands. Deliberately closed — this is
//! not a shell and never executes anything.

use std::collections::HashMap;

use once_cell::sync::Lazy;

static COMMANDS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            "help",
            "Available commands: help, ls, pwd, whoami, hostname, date, uptime, uname -a, free -h, df -h, ps, top, history, clear, cat <file>, echo <text>",
        ),
        ("ls", "Documents  Downloads  Desktop  readme.txt  notes.md  config.json"),
        ("ls -la", "total 24\ndrwxr-xr-x  6 user user 4096 Jan 15 09:00 .\ndrwxr-xr-x  3 root root 4096 Jan 15 09:00 ..\ndrwxr-xr-x  2 user user 4096 Jan 15 09:00 Documents\ndrwxr-xr-x  2 user user 4096 Jan 15 09:00 Downloads\ndrwxr-xr-x  2 user user 4096 Jan 15 09:00 Desktop\n-rw-r--r--  1 user user  220 Jan 15 09:00 readme.txt"),
        ("pwd", "/home/user"),
        ("whoami", "user"),
        ("hostname", "cloudpc-workspace"),
        ("date", "Thu Jan 15 09:00:00 UTC 2026"),
        ("uptime", " 09:00:00 up 3 days,  4:12,  1 user,  load average: 0.08, 0.03, 0.01"),
        ("uname -a", "Linux cloudpc-workspace 6.8.0-virtual #1 SMP x86_64 GNU/Linux"),
        ("free -h", "               total        used        free      shared  buff/cache   available\nMem:           8.0Gi       1.2Gi       5.6Gi        64Mi       1.2Gi       6.5Gi\nSwap:             0B          0B          0B"),
        ("df -h", "Filesystem      Size  Used Avail Use% Mounted on\n/dev/vda1       128G   12G  116G  10% /"),
        ("ps", "    PID TTY          TIME CMD\n      1 pts/0    00:00:00 bash\n     42 pts/0    00:00:00 ps"),
        ("top", "Tasks:   2 total,   1 running,   1 sleeping\n%Cpu(s):  1.3 us,  0.7 sy, 98.0 id\nMiB Mem :   8192.0 total,   5734.4 free,   1228.8 used"),
        ("history", "    1  ls\n    2  pwd\n    3  cat readme.txt"),
        ("clear", ""),
    ])
});

static VIRTUAL_FILES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            "readme.txt",
            "Welcome to your cloud workspace.\nThis terminal is a simulation; files and commands are canned.",
        ),
        ("notes.md", "# Notes\n- remember to stop idle workspaces\n- region eu-west is cheapest"),
        (
            "config.json",
            "{\n  \"theme\": \"dark\",\n  \"keyboard\": \"us\",\n  \"clipboard_sync\": true\n}",
        ),
        ("hosts", "127.0.0.1 localhost\n10.0.0.2 cloudpc-workspace"),
    ])
});

/// Prefix-matched commands answered with a canned acknowledgement.
const ACK_PREFIXES: &[&str] = &["mkdir", "rm", "cp", "mv", "chmod", "sudo"];

/// Execute a simulated command.
pub fn execute(command: &str) -> String {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Some(output) = COMMANDS.get(trimmed) {
        return (*output).to_string();
    }

    if let Some(rest) = trimmed.strip_prefix("echo ") {
        return rest.trim().trim_matches('"').trim_matches('\'').to_string();
    }

    if let Some(name) = trimmed.strip_prefix("cat ") {
        let name = name.trim();
        return match VIRTUAL_FILES.get(name) {
            Some(contents) => (*contents).to_string(),
            None => format!("cat: {name}: No such file or directory"),
        };
    }

    for prefix in ACK_PREFIXES {
        if trimmed == *prefix || trimmed.starts_with(&format!("{prefix} ")) {
            return match *prefix {
                "sudo" => "user is not in the sudoers file. This incident will be reported.".to_string(),
                _ => format!("{prefix}: ok"),
            };
        }
    }

    let program = trimmed.split_whitespace().next().unwrap_or(trimmed);
    format!("bash: {program}: command not found")
}
