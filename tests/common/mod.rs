#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    pub fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_schoold");
        let mut child = Command::new(exe)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn schoold");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    /// Spawns a sidecar with a fresh workspace already selected.
    pub fn with_workspace(prefix: &str) -> Self {
        let mut sidecar = Self::spawn();
        let workspace = temp_dir(prefix);
        sidecar.request_ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        sidecar
    }

    pub fn send_line(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: Value) -> Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Returns the error object of a reply that must have failed with `code`.
    pub fn request_err(&mut self, method: &str, params: Value, code: &str) -> Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        let error = value.get("error").cloned().expect("error object");
        assert_eq!(
            error.get("code").and_then(|v| v.as_str()),
            Some(code),
            "{} failed with the wrong code: {}",
            method,
            error
        );
        error
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, v))
        .to_string()
}

/// A class with one section, one subject and three rostered students
/// (roll numbers 1-3). `other_section_id` is a second section of the class.
pub struct School {
    pub class_id: String,
    pub section_id: String,
    pub other_section_id: String,
    pub subject_id: String,
    pub students: Vec<String>,
}

impl School {
    pub fn seed(sidecar: &mut Sidecar) -> Self {
        let class = sidecar.request_ok("classes.create", json!({ "name": "Grade 7" }));
        let class_id = str_field(&class, "classId");
        let section = sidecar.request_ok(
            "sections.create",
            json!({ "classId": class_id, "name": "A" }),
        );
        let other = sidecar.request_ok(
            "sections.create",
            json!({ "classId": class_id, "name": "B" }),
        );
        let subject = sidecar.request_ok(
            "subjects.create",
            json!({ "classId": class_id, "name": "Science" }),
        );
        let section_id = str_field(&section, "sectionId");
        let students = ["Asha", "Bilal", "Chen"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let created = sidecar.request_ok(
                    "students.create",
                    json!({
                        "classId": class_id,
                        "sectionId": section_id,
                        "name": name,
                        "rollNo": i as i64 + 1
                    }),
                );
                str_field(&created, "studentId")
            })
            .collect();
        Self {
            class_id: class_id.clone(),
            section_id,
            other_section_id: str_field(&other, "sectionId"),
            subject_id: str_field(&subject, "subjectId"),
            students,
        }
    }

    pub fn hr_teacher(&self) -> Value {
        json!({
            "userId": "teacher-1",
            "role": "teacher",
            "sections": [{ "classId": self.class_id, "sectionId": self.section_id }]
        })
    }

    pub fn other_teacher(&self) -> Value {
        json!({
            "userId": "teacher-2",
            "role": "teacher",
            "sections": [{ "classId": self.class_id, "sectionId": self.other_section_id }]
        })
    }

    pub fn student(&self) -> Value {
        json!({
            "userId": self.students[0],
            "role": "student",
            "sections": [{ "classId": self.class_id, "sectionId": self.section_id }]
        })
    }

    pub fn admin(&self) -> Value {
        json!({ "userId": "admin-1", "role": "admin" })
    }

    /// Attendance context params for `date`, acting as `actor`.
    pub fn day(&self, date: &str, actor: Value) -> Value {
        json!({
            "actor": actor,
            "classId": self.class_id,
            "sectionId": self.section_id,
            "date": date
        })
    }

    /// Class test context params for `date`, acting as `actor`.
    pub fn test(&self, date: &str, actor: Value) -> Value {
        json!({
            "actor": actor,
            "classId": self.class_id,
            "sectionId": self.section_id,
            "subjectId": self.subject_id,
            "date": date
        })
    }
}

/// Copies `extra`'s fields into `base`.
pub fn with(mut base: Value, extra: Value) -> Value {
    if let (Some(b), Some(e)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in e {
            b.insert(k.clone(), v.clone());
        }
    }
    base
}
