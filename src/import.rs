use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Canonical subject fields expected by the importer. Spreadsheet headers are
/// mapped onto these through the alias table in [`ImportRules`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SubjectCode,
    SubjectName,
    GradeLevel,
    Semester,
    Track,
    Strand,
    SubjectType,
    TeacherName,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::SubjectCode,
        Field::SubjectName,
        Field::GradeLevel,
        Field::Semester,
        Field::Track,
        Field::Strand,
        Field::SubjectType,
        Field::TeacherName,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::SubjectCode => "Subject Code",
            Field::SubjectName => "Subject Name",
            Field::GradeLevel => "Grade Level",
            Field::Semester => "Semester",
            Field::Track => "Track",
            Field::Strand => "Strand",
            Field::SubjectType => "Subject Type",
            Field::TeacherName => "Teacher Name",
        }
    }
}

/// One track and the strands allowed under it.
#[derive(Debug, Clone)]
pub struct TrackRule {
    pub name: String,
    pub strands: Vec<String>,
}

/// Immutable rule sets driving normalization and validation. Injected rather
/// than read from module globals so tests can run with alternate tables.
#[derive(Debug, Clone)]
pub struct ImportRules {
    pub aliases: HashMap<String, Field>,
    pub tracks: Vec<TrackRule>,
    pub subject_types: Vec<String>,
    pub grade_levels: Vec<i64>,
    pub semesters: Vec<i64>,
}

impl Default for ImportRules {
    fn default() -> Self {
        let mut aliases = HashMap::new();
        let table: [(&str, Field); 18] = [
            ("subjectcode", Field::SubjectCode),
            ("code", Field::SubjectCode),
            ("subjectname", Field::SubjectName),
            ("subject", Field::SubjectName),
            ("subjecttitle", Field::SubjectName),
            ("gradelevel", Field::GradeLevel),
            ("grade", Field::GradeLevel),
            ("yearlevel", Field::GradeLevel),
            ("semester", Field::Semester),
            ("sem", Field::Semester),
            // Common misspelling seen in circulated templates.
            ("semeseter", Field::Semester),
            ("track", Field::Track),
            ("strand", Field::Strand),
            ("subjecttype", Field::SubjectType),
            ("type", Field::SubjectType),
            ("teachername", Field::TeacherName),
            ("teacher", Field::TeacherName),
            ("assignedteacher", Field::TeacherName),
        ];
        for (key, field) in table {
            aliases.insert(key.to_string(), field);
        }
        ImportRules {
            aliases,
            tracks: vec![
                TrackRule {
                    name: "Academic".to_string(),
                    strands: vec!["STEM", "ABM", "HUMSS", "GAS"]
                        .into_iter()
                        .map(String::from)
                        .collect(),
                },
                TrackRule {
                    name: "TVL".to_string(),
                    strands: vec!["ICT", "HE", "IA", "AFA"]
                        .into_iter()
                        .map(String::from)
                        .collect(),
                },
            ],
            subject_types: vec!["core", "specialized", "applied"]
                .into_iter()
                .map(String::from)
                .collect(),
            grade_levels: vec![11, 12],
            semesters: vec![1, 2],
        }
    }
}

impl ImportRules {
    fn track_rule(&self, name: &str) -> Option<&TrackRule> {
        self.tracks
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

/// Reference teacher used for name-to-id resolution. Read-only during import.
#[derive(Debug, Clone)]
pub struct TeacherRef {
    pub id: String,
    pub full_name: String,
}

/// Persistence-ready subject record. Built only for rows that pass every
/// validation rule; there is no partial form of this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedSubject {
    pub subject_code: String,
    pub subject_name: String,
    pub grade_level: i64,
    pub semester: i64,
    pub track: String,
    pub strand: String,
    pub subject_type: String,
    pub teacher_id: String,
    pub teacher_name: String,
}

/// A validation failure tagged with the row it came from. `row` is already in
/// user-facing numbering (the caller decides the offset; spreadsheet rows are
/// index + 2 to account for the header row).
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

impl RowError {
    pub fn render(&self) -> String {
        format!("Row {}: {}", self.row, self.message)
    }
}

#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub subjects: Vec<ValidatedSubject>,
    pub errors: Vec<RowError>,
}

/// A manually-entered row from the import screen's table. These arrive
/// already typed from the input controls, with the teacher id captured at
/// selection time, so they skip header normalization and coercion.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualSubjectRow {
    pub subject_code: String,
    pub subject_name: String,
    pub grade_level: Option<i64>,
    pub semester: Option<i64>,
    pub track: String,
    pub strand: String,
    pub subject_type: String,
    pub teacher_id: String,
}

/// Result of coercing a cell that must end up numeric. `Unparseable` is kept
/// distinct from `Missing` so the required-field check has an unambiguous
/// signal, but both fail that check the same way.
#[derive(Debug, Clone, Copy, PartialEq)]
enum NumCell {
    Value(i64),
    Missing,
    Unparseable,
}

/// Strip all whitespace and lowercase, the form header aliases are keyed by.
fn canonical_key(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Map a raw spreadsheet row onto canonical fields. Unrecognized headers are
/// dropped; values pass through untouched at this stage.
fn normalize_row(raw: &Map<String, Value>, rules: &ImportRules) -> HashMap<Field, Value> {
    let mut out = HashMap::new();
    for (key, value) in raw {
        if let Some(field) = rules.aliases.get(&canonical_key(key)) {
            out.insert(*field, value.clone());
        }
    }
    out
}

/// Read a cell as trimmed text. Numeric cells stringify (subject codes are
/// sometimes typed as numbers); blank or absent cells are `None`.
fn text_cell(value: Option<&Value>) -> Option<String> {
    let value = value?;
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.fract() == 0.0 {
        Some(f as i64)
    } else {
        None
    }
}

fn numeric_value(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().and_then(integral))
}

/// Grade level tolerates prose like "Grade 11": every non-digit character is
/// stripped before parsing.
fn coerce_grade_level(value: Option<&Value>) -> NumCell {
    let Some(value) = value else {
        return NumCell::Missing;
    };
    if let Some(n) = numeric_value(value) {
        return NumCell::Value(n);
    }
    let Some(text) = value.as_str() else {
        return NumCell::Unparseable;
    };
    if text.trim().is_empty() {
        return NumCell::Missing;
    }
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.parse::<i64>() {
        Ok(n) => NumCell::Value(n),
        Err(_) => NumCell::Unparseable,
    }
}

/// Semester accepts ordinal spellings ("1st", "First") as well as plain
/// integers.
fn coerce_semester(value: Option<&Value>) -> NumCell {
    let Some(value) = value else {
        return NumCell::Missing;
    };
    if let Some(n) = numeric_value(value) {
        return NumCell::Value(n);
    }
    let Some(text) = value.as_str() else {
        return NumCell::Unparseable;
    };
    let t = text.trim().to_ascii_lowercase();
    if t.is_empty() {
        return NumCell::Missing;
    }
    match t.as_str() {
        "first" | "1st" => NumCell::Value(1),
        "second" | "2nd" => NumCell::Value(2),
        _ => match t.parse::<i64>() {
            Ok(n) => NumCell::Value(n),
            Err(_) => NumCell::Unparseable,
        },
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.trim().chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
        }
        None => String::new(),
    }
}

/// Capitalize each whitespace-separated word; used for subject names at
/// assembly time.
fn capitalize_words(s: &str) -> String {
    s.split_whitespace()
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a value set for an error message: "11 or 12",
/// "core, specialized or applied".
fn one_of<T: ToString>(items: &[T]) -> String {
    let rendered: Vec<String> = items.iter().map(|i| i.to_string()).collect();
    match rendered.len() {
        0 => String::new(),
        1 => rendered[0].clone(),
        _ => format!(
            "{} or {}",
            rendered[..rendered.len() - 1].join(", "),
            rendered[rendered.len() - 1]
        ),
    }
}

fn find_teacher<'a>(teachers: &'a [TeacherRef], name: &str) -> Option<&'a TeacherRef> {
    teachers
        .iter()
        .find(|t| t.full_name.eq_ignore_ascii_case(name))
}

/// Validate and assemble one normalized spreadsheet row. `row_no` is the
/// user-facing row number. Returns either the finished record or every error
/// the row produced; never a partial record.
fn validate_one(
    row_no: usize,
    cells: &HashMap<Field, Value>,
    teachers: &[TeacherRef],
    rules: &ImportRules,
) -> Result<ValidatedSubject, Vec<RowError>> {
    let mut errors: Vec<RowError> = Vec::new();
    let mut fail = |message: String| {
        errors.push(RowError {
            row: row_no,
            message,
        });
    };

    let subject_code = text_cell(cells.get(&Field::SubjectCode));
    let subject_name = text_cell(cells.get(&Field::SubjectName));
    let grade_level = coerce_grade_level(cells.get(&Field::GradeLevel));
    let semester = coerce_semester(cells.get(&Field::Semester));
    let track = text_cell(cells.get(&Field::Track)).map(|t| title_case(&t));
    let strand = text_cell(cells.get(&Field::Strand)).map(|s| s.to_uppercase());
    let subject_type = text_cell(cells.get(&Field::SubjectType)).map(|t| t.to_lowercase());
    let teacher_name = text_cell(cells.get(&Field::TeacherName));

    // Required-field pass, in canonical field order. Unparseable numerics
    // count as absent here.
    for field in Field::ALL {
        let present = match field {
            Field::SubjectCode => subject_code.is_some(),
            Field::SubjectName => subject_name.is_some(),
            Field::GradeLevel => matches!(grade_level, NumCell::Value(_)),
            Field::Semester => matches!(semester, NumCell::Value(_)),
            Field::Track => track.is_some(),
            Field::Strand => strand.is_some(),
            Field::SubjectType => subject_type.is_some(),
            Field::TeacherName => teacher_name.is_some(),
        };
        if !present {
            fail(format!("{} is required", field.label()));
        }
    }

    // Domain pass, independent of the required pass: a present-but-invalid
    // value reports its own error even when other fields are missing.
    if let NumCell::Value(g) = grade_level {
        if !rules.grade_levels.contains(&g) {
            fail(format!("Grade Level must be {}", one_of(&rules.grade_levels)));
        }
    }
    if let NumCell::Value(s) = semester {
        if !rules.semesters.contains(&s) {
            fail(format!("Semester must be {}", one_of(&rules.semesters)));
        }
    }
    let track_rule = track.as_deref().and_then(|t| rules.track_rule(t));
    if track.is_some() && track_rule.is_none() {
        let names: Vec<&str> = rules.tracks.iter().map(|t| t.name.as_str()).collect();
        fail(format!("Track must be {}", one_of(&names)));
    }
    if let Some(ty) = subject_type.as_deref() {
        if !rules.subject_types.iter().any(|s| s == ty) {
            fail(format!(
                "Subject Type must be {}",
                one_of(&rules.subject_types)
            ));
        }
    }
    if let (Some(rule), Some(strand_value)) = (track_rule, strand.as_deref()) {
        if !rule.strands.iter().any(|s| s == strand_value) {
            fail(format!(
                "Strand {} is not valid for the {} track",
                strand_value, rule.name
            ));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // Teacher resolution runs only for otherwise-clean rows. The emitted
    // record carries the directory's casing of the name, not the sheet's.
    let teacher_name = teacher_name.unwrap_or_default();
    let Some(teacher) = find_teacher(teachers, &teacher_name) else {
        return Err(vec![RowError {
            row: row_no,
            message: format!("Teacher \"{}\" not found", teacher_name),
        }]);
    };
    let track_rule = track_rule.expect("track validated above");

    let NumCell::Value(grade_level) = grade_level else {
        unreachable!("grade level validated above");
    };
    let NumCell::Value(semester) = semester else {
        unreachable!("semester validated above");
    };

    Ok(ValidatedSubject {
        subject_code: subject_code.unwrap_or_default().to_uppercase(),
        subject_name: capitalize_words(&subject_name.unwrap_or_default()),
        grade_level,
        semester,
        track: track_rule.name.clone(),
        strand: strand.unwrap_or_default(),
        subject_type: subject_type.unwrap_or_default(),
        teacher_id: teacher.id.clone(),
        teacher_name: teacher.full_name.clone(),
    })
}

/// Run the full pipeline over spreadsheet rows: header normalization, field
/// coercion, validation, teacher resolution, assembly. Pure: same input, same
/// output. Row at index `i` reports as row `i + 2` (1-based, plus the header
/// row the sheet reader already consumed).
pub fn validate_sheet_rows(
    rows: &[Map<String, Value>],
    teachers: &[TeacherRef],
    rules: &ImportRules,
) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();
    for (i, raw) in rows.iter().enumerate() {
        let cells = normalize_row(raw, rules);
        match validate_one(i + 2, &cells, teachers, rules) {
            Ok(subject) => outcome.subjects.push(subject),
            Err(mut errors) => outcome.errors.append(&mut errors),
        }
    }
    outcome
}

/// Validate manually-entered rows. The required-field rule matches the
/// spreadsheet path; coercion and name-to-id resolution do not re-run because
/// the values arrive typed and the teacher id was captured at selection.
/// Domain sets are still enforced. Errors are tagged with the 1-based table
/// row.
pub fn validate_manual_rows(
    rows: &[ManualSubjectRow],
    teachers: &[TeacherRef],
    rules: &ImportRules,
) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();
    for (i, row) in rows.iter().enumerate() {
        let row_no = i + 1;
        let mut errors: Vec<RowError> = Vec::new();
        let mut fail = |message: String| {
            errors.push(RowError {
                row: row_no,
                message,
            });
        };

        let subject_code = row.subject_code.trim();
        let subject_name = row.subject_name.trim();
        let track = row.track.trim();
        let strand = row.strand.trim().to_uppercase();
        let subject_type = row.subject_type.trim().to_lowercase();
        let teacher_id = row.teacher_id.trim();

        if subject_code.is_empty() {
            fail("Subject Code is required".to_string());
        }
        if subject_name.is_empty() {
            fail("Subject Name is required".to_string());
        }
        if row.grade_level.is_none() {
            fail("Grade Level is required".to_string());
        }
        if row.semester.is_none() {
            fail("Semester is required".to_string());
        }
        if track.is_empty() {
            fail("Track is required".to_string());
        }
        if strand.is_empty() {
            fail("Strand is required".to_string());
        }
        if subject_type.is_empty() {
            fail("Subject Type is required".to_string());
        }
        if teacher_id.is_empty() {
            fail("Teacher is required".to_string());
        }

        if let Some(g) = row.grade_level {
            if !rules.grade_levels.contains(&g) {
                fail(format!("Grade Level must be {}", one_of(&rules.grade_levels)));
            }
        }
        if let Some(s) = row.semester {
            if !rules.semesters.contains(&s) {
                fail(format!("Semester must be {}", one_of(&rules.semesters)));
            }
        }
        let track_rule = if track.is_empty() {
            None
        } else {
            let rule = rules.track_rule(track);
            if rule.is_none() {
                let names: Vec<&str> = rules.tracks.iter().map(|t| t.name.as_str()).collect();
                fail(format!("Track must be {}", one_of(&names)));
            }
            rule
        };
        if !subject_type.is_empty() && !rules.subject_types.iter().any(|s| *s == subject_type) {
            fail(format!(
                "Subject Type must be {}",
                one_of(&rules.subject_types)
            ));
        }
        if let Some(rule) = track_rule {
            if !strand.is_empty() && !rule.strands.iter().any(|s| *s == strand) {
                fail(format!(
                    "Strand {} is not valid for the {} track",
                    strand, rule.name
                ));
            }
        }

        let teacher = if teacher_id.is_empty() {
            None
        } else {
            let found = teachers.iter().find(|t| t.id == teacher_id);
            if found.is_none() {
                fail("Teacher not found".to_string());
            }
            found
        };

        if !errors.is_empty() {
            outcome.errors.append(&mut errors);
            continue;
        }
        let teacher = teacher.expect("teacher checked above");
        let track_rule = track_rule.expect("track checked above");
        outcome.subjects.push(ValidatedSubject {
            subject_code: subject_code.to_uppercase(),
            subject_name: capitalize_words(subject_name),
            grade_level: row.grade_level.expect("grade checked above"),
            semester: row.semester.expect("semester checked above"),
            track: track_rule.name.clone(),
            strand,
            subject_type,
            teacher_id: teacher.id.clone(),
            teacher_name: teacher.full_name.clone(),
        });
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn teachers() -> Vec<TeacherRef> {
        vec![
            TeacherRef {
                id: "t-1".to_string(),
                full_name: "John Dela Cruz".to_string(),
            },
            TeacherRef {
                id: "t-2".to_string(),
                full_name: "Maria Santos".to_string(),
            },
        ]
    }

    fn raw(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn complete_row() -> Map<String, Value> {
        raw(&[
            ("Subject Code", json!("stem-401")),
            ("Subject Name", json!("general physics 1")),
            ("Grade Level", json!("Grade 12")),
            ("Semester", json!("1st")),
            ("Track", json!("academic")),
            ("Strand", json!("stem")),
            ("Type", json!("Specialized")),
            ("Teacher", json!("john dela cruz")),
        ])
    }

    #[test]
    fn headers_tolerate_spacing_case_and_known_misspelling() {
        let row = raw(&[
            ("  SUBJECT   code ", json!("GP1")),
            ("subject NAME", json!("General Physics 1")),
            ("GRADE", json!(12)),
            ("Semeseter", json!(1)),
            ("track", json!("Academic")),
            ("STRAND", json!("STEM")),
            ("type", json!("specialized")),
            ("teacher", json!("John Dela Cruz")),
        ]);
        let out = validate_sheet_rows(&[row], &teachers(), &ImportRules::default());
        assert!(out.errors.is_empty(), "errors: {:?}", out.errors);
        assert_eq!(out.subjects.len(), 1);
        assert_eq!(out.subjects[0].subject_code, "GP1");
    }

    #[test]
    fn unrecognized_headers_are_dropped() {
        let mut row = complete_row();
        row.insert("Remarks".to_string(), json!("keep out"));
        let out = validate_sheet_rows(&[row], &teachers(), &ImportRules::default());
        assert_eq!(out.subjects.len(), 1);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn grade_level_coercion_strips_prose() {
        assert_eq!(
            coerce_grade_level(Some(&json!("Grade 11"))),
            NumCell::Value(11)
        );
        assert_eq!(coerce_grade_level(Some(&json!("13"))), NumCell::Value(13));
        assert_eq!(coerce_grade_level(Some(&json!(12))), NumCell::Value(12));
        assert_eq!(coerce_grade_level(Some(&json!("n/a"))), NumCell::Unparseable);
        assert_eq!(coerce_grade_level(Some(&json!("   "))), NumCell::Missing);
        assert_eq!(coerce_grade_level(None), NumCell::Missing);
    }

    #[test]
    fn semester_coercion_accepts_ordinals() {
        for v in [json!("1st"), json!("First"), json!("first"), json!(1)] {
            assert_eq!(coerce_semester(Some(&v)), NumCell::Value(1), "input {v}");
        }
        assert_eq!(coerce_semester(Some(&json!("2nd"))), NumCell::Value(2));
        assert_eq!(coerce_semester(Some(&json!("third"))), NumCell::Unparseable);
    }

    #[test]
    fn unparseable_semester_reports_as_missing() {
        let mut row = complete_row();
        row.insert("Semester".to_string(), json!("third"));
        let out = validate_sheet_rows(&[row], &teachers(), &ImportRules::default());
        assert!(out.subjects.is_empty());
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].render(), "Row 2: Semester is required");
    }

    #[test]
    fn one_error_per_missing_field() {
        let row = raw(&[
            ("Subject Code", json!("GP1")),
            ("Grade Level", json!(11)),
            ("Track", json!("Academic")),
            ("Strand", json!("STEM")),
        ]);
        let out = validate_sheet_rows(&[row], &teachers(), &ImportRules::default());
        let messages: Vec<String> = out.errors.iter().map(|e| e.render()).collect();
        assert_eq!(
            messages,
            vec![
                "Row 2: Subject Name is required",
                "Row 2: Semester is required",
                "Row 2: Subject Type is required",
                "Row 2: Teacher Name is required",
            ]
        );
    }

    #[test]
    fn domain_errors_are_independent_of_required_errors() {
        // Missing subjectCode and an out-of-domain grade on the same row:
        // both errors surface.
        let mut row = complete_row();
        row.remove("Subject Code");
        row.insert("Grade Level".to_string(), json!("10"));
        let out = validate_sheet_rows(&[row], &teachers(), &ImportRules::default());
        let messages: Vec<String> = out.errors.iter().map(|e| e.render()).collect();
        assert_eq!(
            messages,
            vec![
                "Row 2: Subject Code is required",
                "Row 2: Grade Level must be 11 or 12",
            ]
        );
    }

    #[test]
    fn end_to_end_two_rows() {
        let row_b = {
            let mut r = complete_row();
            r.remove("Subject Code");
            r.insert("Grade Level".to_string(), json!("10"));
            r
        };
        let out = validate_sheet_rows(
            &[complete_row(), row_b],
            &teachers(),
            &ImportRules::default(),
        );
        assert_eq!(out.subjects.len(), 1);
        assert_eq!(out.subjects[0].subject_code, "STEM-401");
        let messages: Vec<String> = out.errors.iter().map(|e| e.render()).collect();
        assert_eq!(
            messages,
            vec![
                "Row 3: Subject Code is required",
                "Row 3: Grade Level must be 11 or 12",
            ]
        );
    }

    #[test]
    fn domain_messages_for_track_and_type() {
        let mut row = complete_row();
        row.insert("Track".to_string(), json!("Sports"));
        row.insert("Type".to_string(), json!("elective"));
        let out = validate_sheet_rows(&[row], &teachers(), &ImportRules::default());
        let messages: Vec<String> = out.errors.iter().map(|e| e.render()).collect();
        assert_eq!(
            messages,
            vec![
                "Row 2: Track must be Academic or TVL",
                "Row 2: Subject Type must be core, specialized or applied",
            ]
        );
    }

    #[test]
    fn strand_must_belong_to_its_track() {
        let mut row = complete_row();
        row.insert("Strand".to_string(), json!("ICT"));
        let out = validate_sheet_rows(&[row], &teachers(), &ImportRules::default());
        assert_eq!(out.errors.len(), 1);
        assert_eq!(
            out.errors[0].render(),
            "Row 2: Strand ICT is not valid for the Academic track"
        );

        let mut row = complete_row();
        row.insert("Track".to_string(), json!("TVL"));
        row.insert("Strand".to_string(), json!("ict"));
        let out = validate_sheet_rows(&[row], &teachers(), &ImportRules::default());
        assert!(out.errors.is_empty(), "errors: {:?}", out.errors);
        assert_eq!(out.subjects[0].track, "TVL");
        assert_eq!(out.subjects[0].strand, "ICT");
    }

    #[test]
    fn teacher_match_is_case_insensitive_and_uses_directory_casing() {
        let out = validate_sheet_rows(&[complete_row()], &teachers(), &ImportRules::default());
        assert_eq!(out.subjects[0].teacher_name, "John Dela Cruz");
        assert_eq!(out.subjects[0].teacher_id, "t-1");
    }

    #[test]
    fn unknown_teacher_excludes_row() {
        let mut row = complete_row();
        row.insert("Teacher".to_string(), json!("Jose Rizal"));
        let out = validate_sheet_rows(&[row], &teachers(), &ImportRules::default());
        assert!(out.subjects.is_empty());
        assert_eq!(
            out.errors[0].render(),
            "Row 2: Teacher \"Jose Rizal\" not found"
        );
    }

    #[test]
    fn field_errors_suppress_teacher_resolution() {
        let mut row = complete_row();
        row.remove("Subject Code");
        row.insert("Teacher".to_string(), json!("Jose Rizal"));
        let out = validate_sheet_rows(&[row], &teachers(), &ImportRules::default());
        let messages: Vec<String> = out.errors.iter().map(|e| e.render()).collect();
        assert_eq!(messages, vec!["Row 2: Subject Code is required"]);
    }

    #[test]
    fn assembly_normalizes_casing() {
        let out = validate_sheet_rows(&[complete_row()], &teachers(), &ImportRules::default());
        let s = &out.subjects[0];
        assert_eq!(s.subject_code, "STEM-401");
        assert_eq!(s.subject_name, "General Physics 1");
        assert_eq!(s.track, "Academic");
        assert_eq!(s.strand, "STEM");
        assert_eq!(s.subject_type, "specialized");
    }

    #[test]
    fn rerun_is_byte_identical() {
        let rows = vec![complete_row(), raw(&[("Subject Code", json!("X"))])];
        let rules = ImportRules::default();
        let a = validate_sheet_rows(&rows, &teachers(), &rules);
        let b = validate_sheet_rows(&rows, &teachers(), &rules);
        assert_eq!(a.subjects, b.subjects);
        assert_eq!(a.errors, b.errors);
    }

    #[test]
    fn alias_table_is_injectable() {
        let mut rules = ImportRules::default();
        rules
            .aliases
            .insert("kurso".to_string(), Field::SubjectName);
        let mut row = complete_row();
        row.remove("Subject Name");
        row.insert("Kurso".to_string(), json!("oral communication"));
        let out = validate_sheet_rows(&[row], &teachers(), &rules);
        assert!(out.errors.is_empty(), "errors: {:?}", out.errors);
        assert_eq!(out.subjects[0].subject_name, "Oral Communication");
    }

    #[test]
    fn manual_rows_follow_required_rule_without_recoercion() {
        let rows = vec![
            ManualSubjectRow {
                subject_code: "pe-101".to_string(),
                subject_name: "physical education 1".to_string(),
                grade_level: Some(11),
                semester: Some(2),
                track: "TVL".to_string(),
                strand: "he".to_string(),
                subject_type: "Applied".to_string(),
                teacher_id: "t-2".to_string(),
            },
            ManualSubjectRow {
                subject_code: String::new(),
                subject_name: "Empirical Research".to_string(),
                grade_level: Some(13),
                semester: Some(1),
                track: "Academic".to_string(),
                strand: "STEM".to_string(),
                subject_type: "applied".to_string(),
                teacher_id: "t-1".to_string(),
            },
        ];
        let out = validate_manual_rows(&rows, &teachers(), &ImportRules::default());
        assert_eq!(out.subjects.len(), 1);
        let s = &out.subjects[0];
        assert_eq!(s.subject_code, "PE-101");
        assert_eq!(s.subject_name, "Physical Education 1");
        assert_eq!(s.strand, "HE");
        assert_eq!(s.teacher_name, "Maria Santos");
        let messages: Vec<&str> = out.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["Subject Code is required", "Grade Level must be 11 or 12"]
        );
        assert_eq!(out.errors[0].row, 2);
    }

    #[test]
    fn manual_row_with_unknown_teacher_id_is_rejected() {
        let rows = vec![ManualSubjectRow {
            subject_code: "EN-101".to_string(),
            subject_name: "Oral Communication".to_string(),
            grade_level: Some(11),
            semester: Some(1),
            track: "Academic".to_string(),
            strand: "GAS".to_string(),
            subject_type: "core".to_string(),
            teacher_id: "t-999".to_string(),
        }];
        let out = validate_manual_rows(&rows, &teachers(), &ImportRules::default());
        assert!(out.subjects.is_empty());
        assert_eq!(out.errors[0].message, "Teacher not found");
    }
}
