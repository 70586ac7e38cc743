mod common;

use common::{str_field, with, School, Sidecar};
use serde_json::json;

const TEST_DAY: &str = "2026-04-14";

#[test]
fn editor_rejects_marks_above_the_maximum_before_saving() {
    let mut sc = Sidecar::with_workspace("schoold-marks-range");
    let school = School::seed(&mut sc);
    let ctx = school.test(TEST_DAY, school.hr_teacher());

    let opened = sc.request_ok(
        "editor.open",
        with(ctx.clone(), json!({ "kind": "marks", "maxMarks": 20 })),
    );
    let editor_id = str_field(&opened, "editorId");
    assert_eq!(opened["editor"]["state"], "not_started");
    assert_eq!(opened["editor"]["maxMarks"], 20.0);
    assert_eq!(opened["editor"]["rows"].as_array().map(|r| r.len()), Some(3));
    assert_eq!(opened["editor"]["rows"][0]["value"], json!(null));

    let error = sc.request_err(
        "editor.setValue",
        json!({ "editorId": editor_id, "studentId": school.students[0], "value": 25 }),
        "out_of_range",
    );
    assert_eq!(error["details"]["maxMarks"], 20.0);
    sc.request_err(
        "editor.setValue",
        json!({ "editorId": editor_id, "studentId": school.students[0], "value": "abc" }),
        "invalid_value",
    );

    // Nothing was written by the rejected edits.
    let status = sc.request_ok("marks.status", ctx.clone());
    assert_eq!(status["status"]["state"], "not_started");

    let edited = sc.request_ok(
        "editor.setValue",
        json!({ "editorId": editor_id, "studentId": school.students[0], "value": "18" }),
    );
    assert_eq!(edited["editor"]["dirty"], true);
    assert_eq!(edited["editor"]["rows"][0]["value"], 18.0);
    sc.request_ok(
        "editor.setValue",
        json!({ "editorId": editor_id, "studentId": school.students[1], "value": 13 }),
    );

    let saved = sc.request_ok("editor.save", json!({ "editorId": editor_id }));
    assert_eq!(saved["outcome"]["version"], 1);
    assert_eq!(saved["editor"]["dirty"], false);
    assert_eq!(saved["editor"]["state"], "draft");

    let rows = sc.request_ok("marks.rows", ctx);
    let rows = rows["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["marks"], 18.0);
    assert_eq!(rows[1]["marks"], 13.0);
}

#[test]
fn finalize_through_the_editor_freezes_the_class_test() {
    let mut sc = Sidecar::with_workspace("schoold-marks-finalize");
    let school = School::seed(&mut sc);
    let ctx = school.test(TEST_DAY, school.hr_teacher());

    let opened = sc.request_ok(
        "editor.open",
        with(ctx.clone(), json!({ "kind": "marks", "maxMarks": 20 })),
    );
    let editor_id = str_field(&opened, "editorId");
    for (student, marks) in [(&school.students[0], 18), (&school.students[1], 13)] {
        sc.request_ok(
            "editor.setValue",
            json!({ "editorId": editor_id, "studentId": student, "value": marks }),
        );
    }

    // Pending edits must be saved first.
    sc.request_err(
        "editor.finalize",
        json!({ "editorId": editor_id }),
        "unsaved_changes",
    );
    sc.request_ok("editor.save", json!({ "editorId": editor_id }));

    let done = sc.request_ok("editor.finalize", json!({ "editorId": editor_id }));
    assert_eq!(done["status"]["state"], "finalized");
    let counts = &done["status"]["counts"];
    assert_eq!(counts["kind"], "marks");
    assert_eq!(counts["graded"], 2);
    assert_eq!(counts["blank"], 1);
    assert_eq!(counts["average"], 15.5);
    assert_eq!(counts["averagePercent"], 77.5);
    assert_eq!(counts["highest"], 18.0);
    assert_eq!(done["editor"]["readOnly"], true);

    sc.request_err(
        "editor.setValue",
        json!({ "editorId": editor_id, "studentId": school.students[2], "value": 10 }),
        "already_finalized",
    );

    // A fresh session over the finalized test is read-only from the start.
    let reopened = sc.request_ok("editor.open", with(ctx.clone(), json!({ "kind": "marks" })));
    assert_eq!(reopened["editor"]["state"], "finalized");
    assert_eq!(reopened["editor"]["readOnly"], true);
    assert_eq!(reopened["editor"]["rows"][0]["value"], 18.0);
    let other_id = str_field(&reopened, "editorId");
    sc.request_err("editor.save", json!({ "editorId": other_id }), "already_finalized");

    sc.request_err(
        "marks.saveDraft",
        with(
            ctx,
            json!({ "rows": [{ "studentId": school.students[2], "marks": 9 }] }),
        ),
        "already_finalized",
    );
}

#[test]
fn max_marks_is_fixed_by_the_first_save() {
    let mut sc = Sidecar::with_workspace("schoold-marks-max");
    let school = School::seed(&mut sc);
    let ctx = school.test(TEST_DAY, school.hr_teacher());
    let rows = json!([{ "studentId": school.students[0], "marks": 7.5 }]);

    sc.request_err(
        "marks.saveDraft",
        with(ctx.clone(), json!({ "rows": rows })),
        "bad_params",
    );
    sc.request_ok(
        "marks.saveDraft",
        with(ctx.clone(), json!({ "rows": rows, "maxMarks": 10 })),
    );
    sc.request_err(
        "marks.saveDraft",
        with(ctx.clone(), json!({ "rows": rows, "maxMarks": 25 })),
        "context_mismatch",
    );
    sc.request_err(
        "marks.saveDraft",
        with(
            ctx.clone(),
            json!({ "rows": [{ "studentId": school.students[1], "marks": 11 }] }),
        ),
        "out_of_range",
    );

    // An explicit null blanks a stored mark.
    sc.request_ok(
        "marks.saveDraft",
        with(
            ctx.clone(),
            json!({ "rows": [{ "studentId": school.students[0], "marks": null }] }),
        ),
    );
    let status = sc.request_ok("marks.status", ctx.clone());
    assert_eq!(status["status"]["maxMarks"], 10.0);
    assert_eq!(status["status"]["version"], 2);
    let stored = sc.request_ok("marks.rows", ctx);
    assert_eq!(stored["rows"][0]["marks"], json!(null));
}

#[test]
fn editor_sessions_are_named_by_id() {
    let mut sc = Sidecar::with_workspace("schoold-editor-sessions");
    let school = School::seed(&mut sc);

    let opened = sc.request_ok(
        "editor.open",
        with(school.day(TEST_DAY, school.hr_teacher()), json!({ "kind": "attendance" })),
    );
    let editor_id = str_field(&opened, "editorId");
    assert_eq!(opened["editor"]["rows"][0]["value"], "present");
    assert_eq!(opened["editor"]["dirty"], true);

    let health = sc.request_ok("health", json!({}));
    assert_eq!(health["openEditors"], 1);

    let closed = sc.request_ok("editor.close", json!({ "editorId": editor_id }));
    assert_eq!(closed["closed"], true);
    sc.request_err("editor.get", json!({ "editorId": editor_id }), "not_found");
    let closed = sc.request_ok("editor.close", json!({ "editorId": editor_id }));
    assert_eq!(closed["closed"], false);

    sc.request_err(
        "editor.open",
        with(school.day(TEST_DAY, school.hr_teacher()), json!({ "kind": "homework" })),
        "bad_params",
    );
}
