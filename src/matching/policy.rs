//! Candidate scoring. Pure and deterministic; it only orders listings and
//! never decides who may be requested.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::profiles::{AlumniProfile, StudentProfile};

use super::UserId;

const OVERLAP_POINTS: u32 = 50;
const FOCUS_POINTS: u32 = 30;
const AVAILABILITY_POINTS: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub alumni_id: UserId,
    pub name: String,
    pub score: u8,
}

/// Compatibility in `0..=100`.
pub fn score_candidate(student: &StudentProfile, alumni: &AlumniProfile) -> u8 {
    let wanted = normalized(student.interests.iter().chain(&student.skills));
    let offered = normalized(alumni.expertise.iter().chain(&alumni.skills));
    let overlap = share(&wanted, &offered, OVERLAP_POINTS);

    let focus = focus_points(student.academic_focus.as_deref(), alumni.academic_focus.as_deref());

    let slots = normalized(&student.availability);
    let open = normalized(&alumni.availability);
    let availability = share(&slots, &open, AVAILABILITY_POINTS);

    // each part is capped by its weight and the weights sum to 100
    (overlap + focus + availability) as u8
}

/// Highest score first, ties by id ascending.
pub fn rank_candidates<I>(student: &StudentProfile, alumni: I) -> Vec<Candidate>
where
    I: IntoIterator<Item = (UserId, String, AlumniProfile)>,
{
    let mut ranked: Vec<Candidate> = alumni
        .into_iter()
        .map(|(alumni_id, name, profile)| Candidate {
            alumni_id,
            name,
            score: score_candidate(student, &profile),
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.alumni_id.cmp(&b.alumni_id)));
    ranked
}

fn normalized<'a>(items: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

/// `points` scaled by how much of `wanted` is covered by `offered`.
fn share(wanted: &BTreeSet<String>, offered: &BTreeSet<String>, points: u32) -> u32 {
    if wanted.is_empty() {
        return 0;
    }
    let hits = wanted.intersection(offered).count() as u32;
    points * hits / wanted.len() as u32
}

fn focus_points(student: Option<&str>, alumni: Option<&str>) -> u32 {
    let (Some(student), Some(alumni)) = (student, alumni) else {
        return 0;
    };
    let student = student.trim().to_lowercase();
    let alumni = alumni.trim().to_lowercase();
    if student.is_empty() || alumni.is_empty() {
        return 0;
    }
    if student == alumni {
        return FOCUS_POINTS;
    }

    let words: BTreeSet<&str> = student.split_whitespace().collect();
    if alumni.split_whitespace().any(|word| words.contains(word)) {
        FOCUS_POINTS / 2
    } else {
        0
    }
}
