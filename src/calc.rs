use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

/// Round-half-up to one decimal: `floor(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Fraction in `0..=1` to a whole percent, rounding half up.
pub fn round_percent(fraction: f64) -> i64 {
    ((100.0 * fraction) + 0.5).floor() as i64
}

/// How points are compared across assignments whose `max_points` differ.
///
/// `Raw` compares stored points as-is (every grade entered through the app is
/// out of 100). `Percent` divides points and threshold by `max_points` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreScale {
    #[default]
    Raw,
    Percent,
}

impl ScoreScale {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "raw" => Some(Self::Raw),
            "percent" => Some(Self::Percent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Percent => "percent",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

impl From<rusqlite::Error> for CalcError {
    fn from(e: rusqlite::Error) -> Self {
        CalcError::new("db_query_failed", e.to_string())
    }
}

/// One submitted grade joined to its assignment and class.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub class_id: String,
    pub class_name: String,
    pub passing_grade: f64,
    pub points_earned: f64,
    pub max_points: f64,
}

impl GradeRecord {
    /// (points, threshold) on the requested scale.
    fn scaled(&self, scale: ScoreScale) -> (f64, f64) {
        match scale {
            ScoreScale::Percent if self.max_points > 0.0 => (
                100.0 * self.points_earned / self.max_points,
                100.0 * self.passing_grade / self.max_points,
            ),
            _ => (self.points_earned, self.passing_grade),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub class_id: String,
    pub class_name: String,
    pub avg_grade: f64,
    pub passing_rate: i64,
    pub assignment_count: usize,
}

#[derive(Debug, Default)]
struct ClassTally {
    name: String,
    total: f64,
    count: usize,
    passing: usize,
}

impl ClassTally {
    fn finish(self, class_id: String) -> ClassSummary {
        let (avg_grade, passing_rate) = if self.count > 0 {
            let n = self.count as f64;
            (
                round_off_1_decimal(self.total / n),
                round_percent(self.passing as f64 / n),
            )
        } else {
            (0.0, 0)
        };
        ClassSummary {
            class_id,
            class_name: self.name,
            avg_grade,
            passing_rate,
            assignment_count: self.count,
        }
    }
}

/// Per-class average, pass rate and count, in first-seen class order.
pub fn compute_class_summaries(records: &[GradeRecord], scale: ScoreScale) -> Vec<ClassSummary> {
    let mut order: Vec<(&str, ClassTally)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for rec in records {
        let slot = *index.entry(rec.class_id.as_str()).or_insert_with(|| {
            order.push((
                rec.class_id.as_str(),
                ClassTally {
                    name: rec.class_name.clone(),
                    ..ClassTally::default()
                },
            ));
            order.len() - 1
        });
        let (points, threshold) = rec.scaled(scale);
        let tally = &mut order[slot].1;
        tally.total += points;
        tally.count += 1;
        if points >= threshold {
            tally.passing += 1;
        }
    }

    order
        .into_iter()
        .map(|(class_id, tally)| tally.finish(class_id.to_string()))
        .collect()
}

/// Aggregator input for one student.
///
/// Inner joins drop grades whose assignment or class link is NULL or dangling;
/// everything returned has a class id, class name and threshold.
pub fn fetch_grade_records(
    conn: &Connection,
    student_id: &str,
) -> Result<Vec<GradeRecord>, CalcError> {
    let mut stmt = conn.prepare(
        "SELECT a.class_id, c.name, a.passing_grade, g.points_earned, a.max_points
         FROM grades g
         JOIN assignments a ON a.id = g.assignment_id
         JOIN classes c ON c.id = a.class_id
         WHERE g.student_id = ?
         ORDER BY g.created_at, g.rowid",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok(GradeRecord {
                class_id: r.get(0)?,
                class_name: r.get(1)?,
                passing_grade: r.get(2)?,
                points_earned: r.get(3)?,
                max_points: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradePoint {
    pub assignment_number: usize,
    pub points_earned: f64,
    pub title: String,
}

/// Grades in submission order, numbered from 1, optionally limited to one class.
pub fn fetch_grade_series(
    conn: &Connection,
    student_id: &str,
    class_id: Option<&str>,
) -> Result<Vec<GradePoint>, CalcError> {
    let mut stmt = conn.prepare(
        "SELECT g.points_earned, a.title
         FROM grades g
         JOIN assignments a ON a.id = g.assignment_id
         WHERE g.student_id = ?1
           AND (?2 IS NULL OR a.class_id = ?2)
         ORDER BY g.created_at, g.rowid",
    )?;
    let rows = stmt
        .query_map((student_id, class_id), |r| {
            Ok((r.get::<_, f64>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, (points_earned, title))| GradePoint {
            assignment_number: i + 1,
            points_earned,
            title,
        })
        .collect())
}
