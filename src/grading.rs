//! Weighted grade aggregation.
//!
//! Every course splits 100% across four categories. Each assessment of a category gets an
//! equal share of the category weight, and contributes `obtained / total * share`.

use crate::api_error::ApiError;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentKind {
    #[display(fmt = "quiz")]
    Quiz,
    #[display(fmt = "assignment")]
    Assignment,
    #[display(fmt = "midterm")]
    Midterm,
    #[display(fmt = "final")]
    Final,
}

impl AssessmentKind {
    /// Share of the final percentage allotted to the whole category.
    pub fn category_weight(self) -> f64 {
        match self {
            AssessmentKind::Quiz => 10.0,
            AssessmentKind::Assignment => 15.0,
            AssessmentKind::Midterm => 30.0,
            AssessmentKind::Final => 45.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentKind::Quiz => "quiz",
            AssessmentKind::Assignment => "assignment",
            AssessmentKind::Midterm => "midterm",
            AssessmentKind::Final => "final",
        }
    }
}

impl FromStr for AssessmentKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quiz" => Ok(AssessmentKind::Quiz),
            "assignment" => Ok(AssessmentKind::Assignment),
            "midterm" => Ok(AssessmentKind::Midterm),
            "final" => Ok(AssessmentKind::Final),
            other => Err(ApiError::bad_request(format!(
                "Unknown assessment type {:?}; expected quiz, assignment, midterm or final",
                other
            ))),
        }
    }
}

/// Sentinel reported while any assessment of the course is still unmarked.
pub const PENDING_GRADE: &str = "-";

const GRADE_BANDS: [(f64, &str, f64); 11] = [
    (90.0, "A+", 4.00),
    (86.0, "A", 4.00),
    (82.0, "A-", 3.67),
    (78.0, "B+", 3.33),
    (74.0, "B", 3.00),
    (70.0, "B-", 2.67),
    (66.0, "C+", 2.33),
    (62.0, "C", 2.00),
    (58.0, "C-", 1.67),
    (54.0, "D+", 1.33),
    (50.0, "D", 1.00),
];

/// Letter grade and 4.0-scale GPA for a percentage.
pub fn letter_grade(percentage: f64) -> (&'static str, f64) {
    GRADE_BANDS
        .iter()
        .find(|(min, _, _)| percentage >= *min)
        .map(|(_, letter, gpa)| (*letter, *gpa))
        .unwrap_or(("F", 0.00))
}

#[derive(Debug, Clone)]
pub struct AssessmentMark {
    pub name: String,
    pub kind: AssessmentKind,
    pub total_marks: i32,
    pub obtained: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredAssessment {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AssessmentKind,
    pub obtained: Option<f64>,
    pub total: i32,
    /// This assessment's share of the final percentage.
    pub weight: f64,
    pub weighted_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeSummary {
    pub quizzes: Vec<ScoredAssessment>,
    pub assignments: Vec<ScoredAssessment>,
    pub midterms: Vec<ScoredAssessment>,
    #[serde(rename = "final")]
    pub final_exam: Option<ScoredAssessment>,
    pub finals: Vec<ScoredAssessment>,
    pub quiz_weighted: f64,
    pub assignment_weighted: f64,
    pub midterm_weighted: f64,
    pub final_weighted: f64,
    /// Rounded to one decimal.
    pub total_percentage: f64,
    pub grade: String,
    pub gpa: f64,
}

impl GradeSummary {
    pub fn empty() -> Self {
        GradeSummary {
            quizzes: Vec::new(),
            assignments: Vec::new(),
            midterms: Vec::new(),
            final_exam: None,
            finals: Vec::new(),
            quiz_weighted: 0.0,
            assignment_weighted: 0.0,
            midterm_weighted: 0.0,
            final_weighted: 0.0,
            total_percentage: 0.0,
            grade: PENDING_GRADE.to_string(),
            gpa: 0.0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.grade != PENDING_GRADE
    }

    pub fn all_scored(&self) -> impl Iterator<Item = &ScoredAssessment> {
        self.quizzes
            .iter()
            .chain(self.assignments.iter())
            .chain(self.midterms.iter())
            .chain(self.finals.iter())
    }
}

fn round_1_decimal(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

pub fn aggregate(assessments: &[AssessmentMark]) -> GradeSummary {
    if assessments.is_empty() {
        return GradeSummary::empty();
    }

    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for a in assessments {
        *counts.entry(a.kind.as_str()).or_insert(0) += 1;
    }
    let share = |kind: AssessmentKind| match counts.get(kind.as_str()) {
        Some(&n) if n > 0 => kind.category_weight() / n as f64,
        _ => 0.0,
    };

    let mut summary = GradeSummary::empty();
    let mut total = 0.0;
    let mut all_marked = true;

    for a in assessments {
        let weight = share(a.kind);
        let weighted_score = match a.obtained {
            Some(obtained) if a.total_marks > 0 => obtained / a.total_marks as f64 * weight,
            _ => 0.0,
        };
        if a.obtained.is_none() {
            all_marked = false;
        }
        total += weighted_score;

        let scored = ScoredAssessment {
            name: a.name.clone(),
            kind: a.kind,
            obtained: a.obtained,
            total: a.total_marks,
            weight,
            weighted_score,
        };
        match a.kind {
            AssessmentKind::Quiz => {
                summary.quiz_weighted += weighted_score;
                summary.quizzes.push(scored);
            }
            AssessmentKind::Assignment => {
                summary.assignment_weighted += weighted_score;
                summary.assignments.push(scored);
            }
            AssessmentKind::Midterm => {
                summary.midterm_weighted += weighted_score;
                summary.midterms.push(scored);
            }
            AssessmentKind::Final => {
                summary.final_weighted += weighted_score;
                summary.finals.push(scored);
            }
        }
    }

    summary.final_exam = summary.finals.first().cloned();
    summary.total_percentage = round_1_decimal(total);

    if all_marked {
        let (letter, gpa) = letter_grade(total);
        summary.grade = letter.to_string();
        summary.gpa = gpa;
    }

    summary
}

/// Class average over students with at least one mark: mean of
/// `sum obtained / sum of all assessment totals`, as a rounded percentage.
pub fn class_average<I>(total_marks: &[i32], obtained_per_student: I) -> i64
where
    I: IntoIterator<Item = f64>,
{
    let total_max: i64 = total_marks.iter().map(|t| *t as i64).sum();
    if total_max <= 0 {
        return 0;
    }

    let percentages: Vec<f64> = obtained_per_student
        .into_iter()
        .map(|obtained| obtained / total_max as f64 * 100.0)
        .collect();
    if percentages.is_empty() {
        return 0;
    }

    (percentages.iter().sum::<f64>() / percentages.len() as f64).round() as i64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeCount {
    pub name: String,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpaOverview {
    pub avg_grade: String,
    /// Two decimals, e.g. "3.67".
    pub avg_gpa: String,
    pub grade_distribution: Vec<GradeCount>,
}

/// Averages over completed courses only; pending courses are ignored.
pub fn gpa_overview<'a, I>(summaries: I) -> GpaOverview
where
    I: IntoIterator<Item = &'a GradeSummary>,
{
    let completed: Vec<&GradeSummary> = summaries.into_iter().filter(|s| s.is_complete()).collect();
    if completed.is_empty() {
        return GpaOverview {
            avg_grade: PENDING_GRADE.to_string(),
            avg_gpa: "0.00".to_string(),
            grade_distribution: Vec::new(),
        };
    }

    let n = completed.len() as f64;
    let avg_gpa = completed.iter().map(|s| s.gpa).sum::<f64>() / n;
    let avg_percentage = completed.iter().map(|s| s.total_percentage).sum::<f64>() / n;

    let mut distribution: BTreeMap<String, usize> = BTreeMap::new();
    for s in &completed {
        let base = s.grade.chars().next().map(String::from).unwrap_or_default();
        *distribution.entry(base).or_insert(0) += 1;
    }

    GpaOverview {
        avg_grade: letter_grade(avg_percentage).0.to_string(),
        avg_gpa: format!("{:.2}", avg_gpa),
        grade_distribution: distribution
            .into_iter()
            .map(|(name, value)| GradeCount { name, value })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(name: &str, kind: AssessmentKind, total: i32, obtained: Option<f64>) -> AssessmentMark {
        AssessmentMark {
            name: name.to_string(),
            kind,
            total_marks: total,
            obtained,
        }
    }

    fn full_course(score: impl Fn(i32) -> Option<f64>) -> Vec<AssessmentMark> {
        vec![
            mark("Quiz 1", AssessmentKind::Quiz, 10, score(10)),
            mark("Quiz 2", AssessmentKind::Quiz, 10, score(10)),
            mark("Quiz 3", AssessmentKind::Quiz, 20, score(20)),
            mark("Assignment 1", AssessmentKind::Assignment, 50, score(50)),
            mark("Assignment 2", AssessmentKind::Assignment, 100, score(100)),
            mark("Mid 1", AssessmentKind::Midterm, 40, score(40)),
            mark("Mid 2", AssessmentKind::Midterm, 40, score(40)),
            mark("Final", AssessmentKind::Final, 100, score(100)),
        ]
    }

    #[test]
    fn full_marks_in_every_category_sum_to_exactly_100() {
        let summary = aggregate(&full_course(|t| Some(t as f64)));
        assert!((summary.total_percentage - 100.0).abs() < 1e-9);
        assert_eq!(summary.grade, "A+");
        assert_eq!(summary.gpa, 4.0);

        let weights: f64 = summary.all_scored().map(|a| a.weight).sum();
        assert!((weights - 100.0).abs() < 1e-9);
    }

    #[test]
    fn weights_never_exceed_100_with_missing_categories() {
        let course = vec![
            mark("Quiz 1", AssessmentKind::Quiz, 10, Some(10.0)),
            mark("Final", AssessmentKind::Final, 100, Some(100.0)),
        ];
        let summary = aggregate(&course);
        let weights: f64 = summary.all_scored().map(|a| a.weight).sum();
        assert!((weights - 55.0).abs() < 1e-9);
        assert!((summary.total_percentage - 55.0).abs() < 1e-9);
        assert_eq!(summary.grade, "D+");
    }

    #[test]
    fn category_share_is_split_evenly() {
        let summary = aggregate(&full_course(|t| Some(t as f64)));
        assert!((summary.quizzes[0].weight - 10.0 / 3.0).abs() < 1e-9);
        assert!((summary.assignments[0].weight - 7.5).abs() < 1e-9);
        assert!((summary.midterms[1].weight - 15.0).abs() < 1e-9);
        assert!((summary.final_exam.as_ref().unwrap().weight - 45.0).abs() < 1e-9);
    }

    #[test]
    fn half_marks_give_half_contribution() {
        let summary = aggregate(&full_course(|t| Some(t as f64 / 2.0)));
        assert!((summary.total_percentage - 50.0).abs() < 1e-9);
        assert!((summary.quiz_weighted - 5.0).abs() < 1e-9);
        assert!((summary.assignment_weighted - 7.5).abs() < 1e-9);
        assert!((summary.midterm_weighted - 15.0).abs() < 1e-9);
        assert!((summary.final_weighted - 22.5).abs() < 1e-9);
        assert_eq!(summary.grade, "D");
    }

    #[test]
    fn missing_mark_leaves_grade_pending() {
        let mut course = full_course(|t| Some(t as f64));
        course[7].obtained = None;
        let summary = aggregate(&course);
        assert_eq!(summary.grade, PENDING_GRADE);
        assert_eq!(summary.gpa, 0.0);
        assert!((summary.total_percentage - 55.0).abs() < 1e-9);
        assert!(!summary.is_complete());
    }

    #[test]
    fn zero_total_marks_contributes_nothing() {
        let course = vec![
            mark("Quiz 1", AssessmentKind::Quiz, 0, Some(5.0)),
            mark("Final", AssessmentKind::Final, 100, Some(100.0)),
        ];
        let summary = aggregate(&course);
        assert_eq!(summary.quizzes[0].weighted_score, 0.0);
        assert!((summary.total_percentage - 45.0).abs() < 1e-9);
    }

    #[test]
    fn no_assessments_is_pending() {
        let summary = aggregate(&[]);
        assert_eq!(summary.grade, PENDING_GRADE);
        assert_eq!(summary.total_percentage, 0.0);
    }

    #[test]
    fn letter_grade_boundaries() {
        assert_eq!(letter_grade(90.0), ("A+", 4.00));
        assert_eq!(letter_grade(89.9), ("A", 4.00));
        assert_eq!(letter_grade(82.0), ("A-", 3.67));
        assert_eq!(letter_grade(74.0), ("B", 3.00));
        assert_eq!(letter_grade(50.0), ("D", 1.00));
        assert_eq!(letter_grade(49.99), ("F", 0.00));
        assert_eq!(letter_grade(0.0), ("F", 0.00));
    }

    #[test]
    fn letter_grade_is_monotonic() {
        let mut last_gpa = 0.0;
        let mut p = 0.0;
        while p <= 100.0 {
            let (_, gpa) = letter_grade(p);
            assert!(gpa >= last_gpa, "gpa dropped at {}", p);
            last_gpa = gpa;
            p += 0.1;
        }
    }

    #[test]
    fn grade_uses_unrounded_percentage() {
        let course = vec![
            mark("Quiz 1", AssessmentKind::Quiz, 10000, Some(9996.0)),
            mark("Assignment 1", AssessmentKind::Assignment, 10, Some(10.0)),
            mark("Mid 1", AssessmentKind::Midterm, 30, Some(30.0)),
            mark("Final", AssessmentKind::Final, 45, Some(35.0)),
        ];
        let summary = aggregate(&course);
        // 89.996 displays as 90.0 but is still an A.
        assert_eq!(summary.total_percentage, 90.0);
        assert_eq!(summary.grade, "A");
    }

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!("Quiz".parse::<AssessmentKind>().unwrap(), AssessmentKind::Quiz);
        assert_eq!("MIDTERM".parse::<AssessmentKind>().unwrap(), AssessmentKind::Midterm);
        assert!("lab".parse::<AssessmentKind>().is_err());
    }

    #[test]
    fn class_average_over_students_with_marks() {
        assert_eq!(class_average(&[50, 50], vec![100.0, 50.0]), 75);
        assert_eq!(class_average(&[50, 50], Vec::new()), 0);
        assert_eq!(class_average(&[0], vec![10.0]), 0);
    }

    #[test]
    fn overview_skips_pending_courses() {
        let complete = aggregate(&full_course(|t| Some(t as f64)));
        let three_quarters = aggregate(&full_course(|t| Some(t as f64 * 0.75)));
        let pending = aggregate(&[mark("Final", AssessmentKind::Final, 100, None)]);

        let overview = gpa_overview(vec![&complete, &three_quarters, &pending]);
        assert_eq!(overview.avg_gpa, "3.50");
        assert_eq!(overview.avg_grade, "A");
        assert_eq!(
            overview.grade_distribution,
            vec![
                GradeCount { name: "A".to_string(), value: 1 },
                GradeCount { name: "B".to_string(), value: 1 },
            ]
        );

        let empty = gpa_overview(vec![&pending]);
        assert_eq!(empty.avg_grade, PENDING_GRADE);
        assert_eq!(empty.avg_gpa, "0.00");
    }
}
