use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A rectangular clickable region with a stable identifier.
///
/// Coordinates live in the problem's own pixel plane with the origin at the
/// top-left; `x1 < x2` and `y1 < y2` for every well-formed box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxSpec {
    pub id: u32,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoxSpec {
    /// Closed-range containment test in problem pixels.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x1 + (self.x2 - self.x1) / 2.0,
            self.y1 + (self.y2 - self.y1) / 2.0,
        )
    }
}

/// One problem as served by the grading server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemData {
    pub boxes: Vec<BoxSpec>,
    pub flash_sequence: Vec<u32>,
    pub flash_count: usize,
    #[serde(default)]
    pub level_name: Option<String>,
    #[serde(default)]
    pub problem_in_level: Option<u32>,
    #[serde(default)]
    pub total_problems: Option<u32>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ProblemError {
    #[error("problem has no boxes")]
    NoBoxes,
    #[error("problem has an empty flash sequence")]
    EmptyFlashSequence,
    #[error("flash_count {flash_count} does not match flash sequence length {sequence_len}")]
    CountMismatch {
        flash_count: usize,
        sequence_len: usize,
    },
    #[error("flash sequence references unknown box id {0}")]
    UnknownBoxId(u32),
    #[error("box {0} has an empty or inverted rectangle")]
    DegenerateBox(u32),
}

impl ProblemData {
    /// Reject problems the controller cannot play before they reach the board.
    pub fn validate(&self) -> Result<(), ProblemError> {
        if self.boxes.is_empty() {
            return Err(ProblemError::NoBoxes);
        }
        // A zero-length sequence has no fill point, so answering could never
        // end; refuse it here rather than strand the session.
        if self.flash_sequence.is_empty() {
            return Err(ProblemError::EmptyFlashSequence);
        }
        if self.flash_count != self.flash_sequence.len() {
            return Err(ProblemError::CountMismatch {
                flash_count: self.flash_count,
                sequence_len: self.flash_sequence.len(),
            });
        }
        for b in &self.boxes {
            if b.x1 >= b.x2 || b.y1 >= b.y2 {
                return Err(ProblemError::DegenerateBox(b.id));
            }
        }
        for id in &self.flash_sequence {
            if self.find_box(*id).is_none() {
                return Err(ProblemError::UnknownBoxId(*id));
            }
        }
        Ok(())
    }

    pub fn find_box(&self, id: u32) -> Option<&BoxSpec> {
        self.boxes.iter().find(|b| b.id == id)
    }

    /// First box in `boxes` order containing the point. Overlapping boxes
    /// resolve to the first match; one click selects at most one box.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<u32> {
        self.boxes.iter().find(|b| b.contains(x, y)).map(|b| b.id)
    }

    /// Extent of the pixel plane the boxes occupy, used to scale the board.
    pub fn bounds(&self) -> (f64, f64) {
        let w = self.boxes.iter().fold(0.0f64, |acc, b| acc.max(b.x2));
        let h = self.boxes.iter().fold(0.0f64, |acc, b| acc.max(b.y2));
        (w.max(1.0), h.max(1.0))
    }

    /// Header shown while the problem is starting, e.g. "Level 2 (3/5)".
    pub fn level_header(&self) -> Option<String> {
        let name = self.level_name.as_ref()?;
        match (self.problem_in_level, self.total_problems) {
            (Some(i), Some(n)) => Some(format!("{} ({}/{})", name, i, n)),
            _ => Some(name.clone()),
        }
    }
}

/// End-of-test marker returned by the problem endpoint in test mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedNotice {
    pub status: String,
    pub message: String,
    pub next_url: String,
}

/// Either a playable problem or the end-of-test marker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ProblemFetch {
    Completed(CompletedNotice),
    Problem(ProblemData),
}

/// Body POSTed to the submit endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub answer: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    Correct,
    Incorrect,
    /// Anything else the server says; treated as a server-reported error.
    Other,
}

/// Grading response for a practice submission.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Verdict {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl Verdict {
    pub fn status(&self) -> VerdictStatus {
        match self.status.as_str() {
            "correct" => VerdictStatus::Correct,
            "incorrect" => VerdictStatus::Incorrect,
            _ => VerdictStatus::Other,
        }
    }

    pub fn message_or_default(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sample_problem() -> ProblemData {
        ProblemData {
            boxes: vec![
                BoxSpec {
                    id: 1,
                    x1: 0.0,
                    y1: 0.0,
                    x2: 10.0,
                    y2: 10.0,
                },
                BoxSpec {
                    id: 2,
                    x1: 20.0,
                    y1: 0.0,
                    x2: 30.0,
                    y2: 10.0,
                },
            ],
            flash_sequence: vec![2, 1],
            flash_count: 2,
            level_name: Some("Level 1".to_string()),
            problem_in_level: Some(1),
            total_problems: Some(5),
        }
    }

    #[test]
    fn box_contains_is_closed_range() {
        let b = BoxSpec {
            id: 1,
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
        };
        assert!(b.contains(0.0, 0.0));
        assert!(b.contains(10.0, 10.0));
        assert!(b.contains(5.0, 5.0));
        assert!(!b.contains(10.1, 5.0));
        assert!(!b.contains(-0.1, 5.0));
    }

    #[test]
    fn box_center() {
        let b = BoxSpec {
            id: 1,
            x1: 10.0,
            y1: 20.0,
            x2: 30.0,
            y2: 60.0,
        };
        assert_eq!(b.center(), (20.0, 40.0));
    }

    #[test]
    fn valid_problem_passes_validation() {
        assert_eq!(sample_problem().validate(), Ok(()));
    }

    #[test]
    fn validation_rejects_empty_boxes() {
        let mut p = sample_problem();
        p.boxes.clear();
        assert_eq!(p.validate(), Err(ProblemError::NoBoxes));
    }

    #[test]
    fn validation_rejects_empty_flash_sequence() {
        let mut p = sample_problem();
        p.flash_sequence.clear();
        p.flash_count = 0;
        assert_eq!(p.validate(), Err(ProblemError::EmptyFlashSequence));
    }

    #[test]
    fn validation_rejects_count_mismatch() {
        let mut p = sample_problem();
        p.flash_count = 3;
        assert_matches!(p.validate(), Err(ProblemError::CountMismatch { .. }));
    }

    #[test]
    fn validation_rejects_unknown_flash_id() {
        let mut p = sample_problem();
        p.flash_sequence = vec![1, 99];
        assert_eq!(p.validate(), Err(ProblemError::UnknownBoxId(99)));
    }

    #[test]
    fn validation_rejects_inverted_rectangle() {
        let mut p = sample_problem();
        p.boxes[0].x2 = -5.0;
        assert_eq!(p.validate(), Err(ProblemError::DegenerateBox(1)));
    }

    #[test]
    fn hit_test_finds_containing_box() {
        let p = sample_problem();
        assert_eq!(p.hit_test(5.0, 5.0), Some(1));
        assert_eq!(p.hit_test(25.0, 5.0), Some(2));
        assert_eq!(p.hit_test(15.0, 5.0), None);
    }

    #[test]
    fn hit_test_overlap_resolves_to_first_box() {
        let mut p = sample_problem();
        // Make box 2 overlap box 1 entirely
        p.boxes[1] = BoxSpec {
            id: 2,
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
        };
        assert_eq!(p.hit_test(5.0, 5.0), Some(1));
    }

    #[test]
    fn bounds_cover_all_boxes() {
        let p = sample_problem();
        assert_eq!(p.bounds(), (30.0, 10.0));
    }

    #[test]
    fn level_header_formats() {
        let p = sample_problem();
        assert_eq!(p.level_header(), Some("Level 1 (1/5)".to_string()));

        let mut anon = p.clone();
        anon.level_name = None;
        assert_eq!(anon.level_header(), None);

        let mut bare = p;
        bare.problem_in_level = None;
        assert_eq!(bare.level_header(), Some("Level 1".to_string()));
    }

    #[test]
    fn problem_fetch_parses_problem_payload() {
        let json = r#"{
            "boxes": [{"id": 1, "x1": 0, "y1": 0, "x2": 10, "y2": 10}],
            "flash_sequence": [1],
            "flash_count": 1,
            "level_name": "Level 1",
            "problem_in_level": 1,
            "total_problems": 5
        }"#;
        let fetch: ProblemFetch = serde_json::from_str(json).unwrap();
        assert_matches!(fetch, ProblemFetch::Problem(p) => {
            assert_eq!(p.boxes.len(), 1);
            assert_eq!(p.flash_sequence, vec![1]);
            assert_eq!(p.flash_count, 1);
        });
    }

    #[test]
    fn problem_fetch_parses_completed_marker() {
        let json = r#"{"status": "completed", "message": "All done", "next_url": "/results"}"#;
        let fetch: ProblemFetch = serde_json::from_str(json).unwrap();
        assert_matches!(fetch, ProblemFetch::Completed(c) => {
            assert_eq!(c.status, "completed");
            assert_eq!(c.message, "All done");
            assert_eq!(c.next_url, "/results");
        });
    }

    #[test]
    fn problem_fetch_omits_optional_metadata() {
        let json = r#"{
            "boxes": [{"id": 7, "x1": 1, "y1": 2, "x2": 3, "y2": 4}],
            "flash_sequence": [7],
            "flash_count": 1
        }"#;
        let fetch: ProblemFetch = serde_json::from_str(json).unwrap();
        assert_matches!(fetch, ProblemFetch::Problem(p) => {
            assert_eq!(p.level_name, None);
            assert_eq!(p.level_header(), None);
        });
    }

    #[test]
    fn answer_payload_wire_format() {
        let payload = AnswerPayload {
            answer: vec![3, 1, 2],
        };
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"answer":[3,1,2]}"#
        );
    }

    #[test]
    fn verdict_status_mapping() {
        let correct: Verdict = serde_json::from_str(r#"{"status":"correct","message":"ok"}"#).unwrap();
        assert_eq!(correct.status(), VerdictStatus::Correct);

        let incorrect: Verdict =
            serde_json::from_str(r#"{"status":"incorrect","message":"try again"}"#).unwrap();
        assert_eq!(incorrect.status(), VerdictStatus::Incorrect);

        let odd: Verdict = serde_json::from_str(r#"{"status":"error"}"#).unwrap();
        assert_eq!(odd.status(), VerdictStatus::Other);
        assert_eq!(odd.message_or_default(), "unknown error");
    }
}
