#![cfg(all(unix, feature = "cli"))]

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use lineprims::channel::{connect, UnixChannelListener};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/lpcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_connect(path: &Path, timeout: Duration) -> io::Result<UnixStream> {
    let start = Instant::now();
    loop {
        match connect(path) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                if start.elapsed() >= timeout {
                    return Err(io::Error::other(format!("connect timeout: {err}")));
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

fn read_until(stream: &mut UnixStream, needle: &[u8], timeout: Duration) -> Vec<u8> {
    stream
        .set_read_timeout(Some(timeout))
        .expect("read timeout should apply");
    let mut seen = Vec::new();
    let mut buf = [0u8; 64];
    while !seen.windows(needle.len()).any(|w| w == needle) {
        let n = stream.read(&mut buf).expect("peer should answer in time");
        assert!(n > 0, "peer closed early; got {seen:?}");
        seen.extend_from_slice(&buf[..n]);
    }
    seen
}

fn lineprims() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lineprims"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn listen_prints_count_tokens_as_json() {
    let dir = unique_temp_dir("listen");
    let sock_path = dir.join("listen.sock");

    let child = lineprims()
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg(&sock_path)
        .arg("--count")
        .arg("2")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen command should start");

    let mut client =
        wait_for_connect(&sock_path, Duration::from_secs(3)).expect("client should connect");
    client
        .write_all(b"alpha\nbeta\n")
        .expect("client write should succeed");

    let output = child.wait_with_output().expect("listen should exit");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf-8");
    let tokens: Vec<String> = stdout
        .lines()
        .map(|line| {
            let value: serde_json::Value =
                serde_json::from_str(line).expect("each line should be json");
            assert_eq!(value["connection"], 1);
            value["token"].as_str().expect("token should be a string").to_string()
        })
        .collect();
    assert_eq!(tokens, vec!["alpha", "beta"]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn listen_honours_custom_delimiters() {
    let dir = unique_temp_dir("listen-delims");
    let sock_path = dir.join("listen.sock");

    let child = lineprims()
        .arg("--format")
        .arg("raw")
        .arg("listen")
        .arg(&sock_path)
        .arg("--count")
        .arg("3")
        .arg("--delimiters")
        .arg("59")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen command should start");

    let mut client =
        wait_for_connect(&sock_path, Duration::from_secs(3)).expect("client should connect");
    client.write_all(b"a=1;b=2;;").expect("client write should succeed");

    let output = child.wait_with_output().expect("listen should exit");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "a=1\nb=2\n\n");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn echo_returns_each_line() {
    let dir = unique_temp_dir("echo");
    let sock_path = dir.join("echo.sock");

    let mut child = lineprims()
        .arg("echo")
        .arg(&sock_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("echo command should start");

    let mut client =
        wait_for_connect(&sock_path, Duration::from_secs(3)).expect("client should connect");
    client.write_all(b"ping\n").expect("client write should succeed");
    let seen = read_until(&mut client, b"ping\r\n", Duration::from_secs(3));
    assert!(seen.starts_with(b"ping\r\n"));

    client.write_all(b"again\n").expect("session should stay open");
    read_until(&mut client, b"again\r\n", Duration::from_secs(3));

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_waits_for_reply() {
    let dir = unique_temp_dir("send");
    let sock_path = dir.join("send.sock");
    let listener = UnixChannelListener::bind(&sock_path).expect("test listener should bind");

    let server = thread::spawn(move || {
        let mut stream = listener.accept().expect("accept should succeed");
        let received = read_until(&mut stream, b"\r\n", Duration::from_secs(5));
        stream.write_all(b"pong\r\n").expect("reply should send");
        received
    });

    let output = lineprims()
        .arg("--format")
        .arg("raw")
        .arg("send")
        .arg(&sock_path)
        .arg("--data")
        .arg("ping")
        .arg("--wait")
        .arg("--wait-timeout")
        .arg("5s")
        .output()
        .expect("send command should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "pong\n");
    assert_eq!(server.join().expect("server thread should finish"), b"ping\r\n");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_to_missing_socket_fails() {
    let dir = unique_temp_dir("missing");
    let output = lineprims()
        .arg("send")
        .arg(dir.join("nobody.sock"))
        .arg("--data")
        .arg("hello")
        .output()
        .expect("send command should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_crate_version() {
    let output = lineprims()
        .arg("version")
        .output()
        .expect("version command should run");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("lineprims {}", env!("CARGO_PKG_VERSION"))
    );
}
