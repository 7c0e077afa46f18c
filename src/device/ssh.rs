//! SSH transport backed by libssh2.

use std::fs::File;
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ssh2::{CheckResult, KnownHostFileKind};
use tracing::debug;

use super::{Session, Transport};
use crate::error::RosupError;
use crate::output::create_transfer_bar;

const SSH_PORT: u16 = 22;

/// System-wide known hosts, read when present.
const SYSTEM_KNOWN_HOSTS: &str = "/etc/ssh/ssh_known_hosts";

/// Private keys tried after the SSH agent, in order.
const DEFAULT_IDENTITIES: &[&str] = &["id_ed25519", "id_ecdsa", "id_rsa"];

/// Opens authenticated SSH sessions.
pub struct SshTransport;

impl Transport for SshTransport {
    fn open(
        &self,
        host: &str,
        username: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Session>, RosupError> {
        let tcp = connect_tcp(host, timeout)?;

        let mut session = ssh2::Session::new().map_err(|e| RosupError::ssh("session", e))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        session
            .handshake()
            .map_err(|e| RosupError::ssh("handshake", e))?;

        verify_host_key(&session, host)?;
        authenticate(&session, username)?;

        debug!("SSH session established to {}@{}", username, host);

        Ok(Box::new(SshSession {
            session,
            host: host.to_string(),
        }))
    }
}

/// Connect to the first resolved address that accepts within the timeout.
fn connect_tcp(host: &str, timeout: Duration) -> Result<TcpStream, RosupError> {
    let addrs = (host, SSH_PORT)
        .to_socket_addrs()
        .map_err(|e| RosupError::ssh("resolve", e))?;

    let mut last_error = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = e,
        }
    }

    Err(RosupError::ssh("connect", last_error))
}

fn known_hosts_files() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from(SYSTEM_KNOWN_HOSTS)];
    if let Some(home) = dirs::home_dir() {
        files.push(home.join(".ssh").join("known_hosts"));
    }
    files
}

/// Reject hosts whose key isn't in a known_hosts file.
fn verify_host_key(session: &ssh2::Session, host: &str) -> Result<(), RosupError> {
    let mut known_hosts = session
        .known_hosts()
        .map_err(|e| RosupError::ssh("known_hosts", e))?;

    for file in known_hosts_files().iter().filter(|f| f.is_file()) {
        if let Err(e) = known_hosts.read_file(file, KnownHostFileKind::OpenSSH) {
            debug!("Skipping unreadable {}: {}", file.display(), e);
        }
    }

    let (key, _) = session
        .host_key()
        .ok_or_else(|| RosupError::Ssh(format!("{} presented no host key", host)))?;

    match known_hosts.check_port(host, SSH_PORT, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(RosupError::Ssh(format!(
            "host key for {} not found in known_hosts",
            host
        ))),
        CheckResult::Mismatch => Err(RosupError::Ssh(format!(
            "host key for {} does not match known_hosts",
            host
        ))),
        CheckResult::Failure => Err(RosupError::Ssh(format!(
            "failed to check host key for {}",
            host
        ))),
    }
}

/// Try the SSH agent, then the default identity files.
fn authenticate(session: &ssh2::Session, username: &str) -> Result<(), RosupError> {
    match session.userauth_agent(username) {
        Ok(()) if session.authenticated() => return Ok(()),
        Ok(()) => {}
        Err(e) => debug!("SSH agent authentication failed: {}", e),
    }

    let ssh_dir = dirs::home_dir().map(|home| home.join(".ssh"));
    for identity in ssh_dir
        .iter()
        .flat_map(|dir| DEFAULT_IDENTITIES.iter().map(move |name| dir.join(name)))
        .filter(|path| path.is_file())
    {
        match session.userauth_pubkey_file(username, None, &identity, None) {
            Ok(()) if session.authenticated() => return Ok(()),
            Ok(()) => {}
            Err(e) => debug!("Key {} rejected: {}", identity.display(), e),
        }
    }

    Err(RosupError::Ssh(format!(
        "authentication failed for user {}",
        username
    )))
}

/// A live SSH session to one device.
pub struct SshSession {
    session: ssh2::Session,
    host: String,
}

impl Session for SshSession {
    fn exec(&mut self, command: &str) -> Result<String, RosupError> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| RosupError::ssh("channel", e))?;
        channel
            .exec(command)
            .map_err(|e| RosupError::ssh("exec", e))?;

        let mut output = String::new();
        channel.read_to_string(&mut output)?;
        channel
            .wait_close()
            .map_err(|e| RosupError::ssh("close channel", e))?;

        Ok(output)
    }

    fn send(&mut self, command: &str) -> Result<(), RosupError> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| RosupError::ssh("channel", e))?;
        channel
            .exec(command)
            .map_err(|e| RosupError::ssh("exec", e))?;
        // The device may drop the connection before replying.
        let _ = channel.close();
        Ok(())
    }

    fn upload(&mut self, path: &Path) -> Result<(), RosupError> {
        let transfer_error = |reason: String| RosupError::Transfer {
            host: self.host.clone(),
            reason,
        };

        let file_name = path
            .file_name()
            .ok_or_else(|| transfer_error(format!("{} has no file name", path.display())))?;
        let size = std::fs::metadata(path)?.len();

        let mut remote = self
            .session
            .scp_send(Path::new(file_name), 0o644, size, None)
            .map_err(|e| transfer_error(e.to_string()))?;

        let pb = create_transfer_bar(size);
        pb.set_message(file_name.to_string_lossy().to_string());
        let mut local = pb.wrap_read(File::open(path)?);

        io::copy(&mut local, &mut remote).map_err(|e| transfer_error(e.to_string()))?;
        pb.finish_and_clear();

        remote
            .send_eof()
            .and_then(|_| remote.wait_eof())
            .and_then(|_| remote.close())
            .and_then(|_| remote.wait_close())
            .map_err(|e| transfer_error(e.to_string()))?;

        Ok(())
    }

    fn close(self: Box<Self>) {
        if let Err(e) = self.session.disconnect(None, "closing", None) {
            debug!("Disconnect from {} failed: {}", self.host, e);
        }
    }
}
