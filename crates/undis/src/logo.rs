pub const LOGO: &str = r#"
                 _ _
 _   _ _ __   __| (_)___
| | | | '_ \ / _` | / __|
| |_| | | | | (_| | \__ \
 \__,_|_| |_|\__,_|_|___/
"#;

pub fn show_logo(listen_addr: &str, backend_addr: &str) {
	let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

	let info = format!(
		r#"Version:     v{} ({}{} on {})
Built:       {} with {} for {}
Started:     {}
Listening:   {}
Backend:     {}"#,
		env!("CARGO_PKG_VERSION"),
		env!("UNDIS_GIT_HASH"),
		env!("UNDIS_GIT_DIRTY"),
		env!("UNDIS_GIT_BRANCH"),
		env!("UNDIS_BUILD_DATE"),
		env!("UNDIS_RUSTC_VERSION"),
		env!("UNDIS_TARGET"),
		now,
		listen_addr,
		backend_addr
	);

	println!("{}\n{}\n", LOGO.trim_end(), info);
}
