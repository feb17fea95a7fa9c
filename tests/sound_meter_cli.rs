use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn sound_meter_bin() -> &'static str {
    env!("CARGO_BIN_EXE_sound-meter")
}

#[test]
fn help_mentions_name() {
    let output = Command::new(sound_meter_bin())
        .arg("--help")
        .output()
        .expect("run sound-meter --help");
    assert!(output.status.success());
    assert!(combined_output(&output).contains("Sound Meter"));
}

#[test]
fn list_input_devices_prints_message() {
    let output = Command::new(sound_meter_bin())
        .arg("--list-input-devices")
        .env("SOUND_METER_NO_LOGS", "1")
        .output()
        .expect("run sound-meter --list-input-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(
        combined.contains("audio input devices")
            || combined.contains("Failed to list audio input devices")
    );
}

#[test]
fn invalid_buffer_is_rejected() {
    let output = Command::new(sound_meter_bin())
        .args(["--buffer-ms", "1", "--output", "line"])
        .output()
        .expect("run sound-meter with bad buffer");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--buffer-ms"));
}

#[test]
fn denied_permission_reports_notice_as_json() {
    let output = Command::new(sound_meter_bin())
        .args(["--deny-microphone", "--output", "json"])
        .output()
        .expect("run sound-meter --deny-microphone");
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(events[0]["event"], "reading");
    assert_eq!(events[0]["text"], "Waiting...");
    assert_eq!(events[1]["event"], "notice");
    assert_eq!(
        events[1]["message"],
        "Recording permission is denied to use this feature"
    );
}
