mod common;

use common::{str_field, with, School, Sidecar};
use serde_json::json;

const DAY: &str = "2026-05-04";

#[test]
fn only_the_homeroom_teacher_or_an_admin_may_record() {
    let mut sc = Sidecar::with_workspace("schoold-access-write");
    let school = School::seed(&mut sc);
    let rows = json!({ "rows": [{ "studentId": school.students[0], "status": "present" }] });

    sc.request_err(
        "attendance.saveDraft",
        with(school.day(DAY, school.student()), rows.clone()),
        "forbidden",
    );
    sc.request_err(
        "attendance.saveDraft",
        with(school.day(DAY, school.other_teacher()), rows.clone()),
        "forbidden",
    );
    let status = sc.request_ok("attendance.status", school.day(DAY, school.admin()));
    assert_eq!(status["status"]["state"], "not_started");

    sc.request_ok(
        "attendance.saveDraft",
        with(school.day(DAY, school.admin()), rows.clone()),
    );
    sc.request_err(
        "attendance.finalize",
        school.day(DAY, school.other_teacher()),
        "forbidden",
    );
    sc.request_ok("attendance.finalize", school.day(DAY, school.hr_teacher()));
}

#[test]
fn students_see_their_section_through_read_only_editors() {
    let mut sc = Sidecar::with_workspace("schoold-access-read");
    let school = School::seed(&mut sc);
    sc.request_ok(
        "attendance.saveDraft",
        with(
            school.day(DAY, school.hr_teacher()),
            json!({ "rows": [{ "studentId": school.students[0], "status": "absent" }] }),
        ),
    );

    let rows = sc.request_ok("attendance.rows", school.day(DAY, school.student()));
    assert_eq!(rows["rows"][0]["status"], "absent");

    let opened = sc.request_ok(
        "editor.open",
        with(school.day(DAY, school.student()), json!({ "kind": "attendance" })),
    );
    assert_eq!(opened["editor"]["readOnly"], true);
    let editor_id = str_field(&opened, "editorId");
    sc.request_err(
        "editor.setValue",
        json!({ "editorId": editor_id, "studentId": school.students[0], "value": "present" }),
        "read_only",
    );

    // Another section's teacher cannot even look.
    sc.request_err(
        "attendance.rows",
        school.day(DAY, school.other_teacher()),
        "forbidden",
    );
    sc.request_err(
        "attendance.history",
        json!({
            "actor": school.other_teacher(),
            "classId": school.class_id,
            "sectionId": school.section_id
        }),
        "forbidden",
    );
}

#[test]
fn calls_without_a_valid_actor_are_bad_params() {
    let mut sc = Sidecar::with_workspace("schoold-access-actor");
    let school = School::seed(&mut sc);
    let mut params = school.day(DAY, school.hr_teacher());
    params.as_object_mut().expect("params").remove("actor");
    sc.request_err("attendance.status", params.clone(), "bad_params");

    params["actor"] = json!({ "userId": "", "role": "teacher" });
    sc.request_err("attendance.status", params.clone(), "bad_params");

    params["actor"] = school.admin();
    params["sectionId"] = json!("missing-section");
    sc.request_err("attendance.status", params, "not_found");
}
