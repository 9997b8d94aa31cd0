//! Port and process helpers for launched browsers.

/// Returns `true` when a process with `pid` appears alive.
pub fn pid_is_alive(pid: u32) -> bool {
	if pid == 0 {
		return false;
	}

	#[cfg(unix)]
	{
		if std::path::Path::new("/proc").join(pid.to_string()).exists() {
			return true;
		}
		std::process::Command::new("kill")
			.arg("-0")
			.arg(pid.to_string())
			.status()
			.map(|status| status.success())
			.unwrap_or(pid == std::process::id())
	}

	#[cfg(not(unix))]
	{
		pid == std::process::id()
	}
}

/// Returns `true` when `port` can be bound on localhost.
pub fn port_available(port: u16) -> bool {
	std::net::TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Picks a debugging port: `preferred` when it is free, otherwise one the OS hands out.
pub fn pick_debug_port(preferred: Option<u16>) -> std::io::Result<u16> {
	if let Some(port) = preferred.filter(|port| port_available(*port)) {
		return Ok(port);
	}
	let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
	Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[cfg(unix)]
	#[test]
	fn current_process_is_alive() {
		assert!(pid_is_alive(std::process::id()));
	}

	#[test]
	fn pid_zero_is_never_alive() {
		assert!(!pid_is_alive(0));
	}

	#[test]
	fn busy_preferred_port_falls_back() {
		let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
		let busy = listener.local_addr().unwrap().port();
		assert!(!port_available(busy));
		let picked = pick_debug_port(Some(busy)).unwrap();
		assert_ne!(picked, busy);
	}
}
