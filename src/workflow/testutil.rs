use rusqlite::Connection;
use uuid::Uuid;

use super::access::{ActorContext, Role, SectionRef};

pub fn seed_section(conn: &Connection) -> (String, String) {
    let class_id = Uuid::new_v4().to_string();
    let section_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name) VALUES(?, 'Grade 7')",
        [&class_id],
    )
    .expect("insert class");
    conn.execute(
        "INSERT INTO sections(id, class_id, name) VALUES(?, ?, 'A')",
        (&section_id, &class_id),
    )
    .expect("insert section");
    (class_id, section_id)
}

pub fn seed_subject(conn: &Connection, class_id: &str) -> String {
    let subject_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, class_id, name) VALUES(?, ?, 'Science')",
        (&subject_id, class_id),
    )
    .expect("insert subject");
    subject_id
}

pub fn add_student(
    conn: &Connection,
    class_id: &str,
    section_id: &str,
    name: &str,
    roll_no: Option<i64>,
) -> String {
    let student_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, class_id, section_id, name, roll_no, active)
         VALUES(?, ?, ?, ?, ?, 1)",
        (&student_id, class_id, section_id, name, roll_no),
    )
    .expect("insert student");
    student_id
}

pub fn hr_teacher(class_id: &str, section_id: &str) -> ActorContext {
    ActorContext {
        user_id: "teacher-1".to_string(),
        role: Role::Teacher,
        sections: vec![SectionRef {
            class_id: class_id.to_string(),
            section_id: section_id.to_string(),
        }],
    }
}

pub fn student_actor(class_id: &str, section_id: &str) -> ActorContext {
    ActorContext {
        user_id: "student-1".to_string(),
        role: Role::Student,
        sections: vec![SectionRef {
            class_id: class_id.to_string(),
            section_id: section_id.to_string(),
        }],
    }
}
