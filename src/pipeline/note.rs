//! Clinical note synthesis: turns an encounter transcript into a
//! Markdown internal-medicine chart.
//!
//! Uses the live provider (non-streaming) when configured; otherwise
//! renders a fixed template so the endpoint always answers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::consult::openai::NOTE_TEMPERATURE;
use super::consult::{ChatMessage, CompletionError, HistoryEntry, OpenAiClient};
use crate::locale::Locale;
use crate::models::enums::MessageRole;

/// Characters of the last patient message kept as the chief complaint.
pub const CHIEF_COMPLAINT_MAX_CHARS: usize = 50;

#[derive(Error, Debug)]
pub enum NoteError {
    #[error("Clinical note provider call failed: {0}")]
    Provider(#[from] CompletionError),

    #[error("Clinical note provider returned an empty note")]
    EmptyNote,
}

/// A synthesized chart, as returned to the clinician.
#[derive(Debug, Clone, Serialize)]
pub struct ClinicalNote {
    pub note_md: String,
    pub chief_complaint: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════
// Transcript
// ═══════════════════════════════════════════════════════════

/// One `speaker: content` line per message, oldest first.
///
/// Anything that is neither the patient nor the assistant is labelled as
/// the system.
pub fn render_transcript(history: &[HistoryEntry], locale: Locale) -> String {
    history
        .iter()
        .map(|entry| {
            let role = MessageRole::from_str(&entry.role).unwrap_or(MessageRole::System);
            format!("{}: {}", locale.speaker_label(role), entry.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// First 50 characters of the most recent patient message.
///
/// `None` when the patient has not spoken (or only sent an empty message).
pub fn extract_chief_complaint(history: &[HistoryEntry]) -> Option<String> {
    let last_user = history
        .iter()
        .rev()
        .find(|entry| entry.role == MessageRole::User.as_str())?;

    let content = last_user.content.as_str();
    let boundary = content
        .char_indices()
        .nth(CHIEF_COMPLAINT_MAX_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(content.len());

    let complaint = &content[..boundary];
    (!complaint.is_empty()).then(|| complaint.to_string())
}

// ═══════════════════════════════════════════════════════════
// Prompts & template
// ═══════════════════════════════════════════════════════════

fn note_system_prompt(locale: Locale) -> &'static str {
    match locale {
        Locale::Ja => concat!(
            "あなたは日本の内科医です。以下の対話履歴をもとに、医療現場で使える簡潔で網羅的なカルテ（Markdown）を作成します。\n",
            "- 日本語、見出し付き(Markdown)\n",
            "- 主訴(CC)、現病歴(HPI)、既往歴、アレルギー、内服薬、生活歴/家族歴(分かる範囲)、バイタル(不明なら「未測定」)、",
            "身体所見(対話から抽出/推定)、鑑別診断、評価(Assessment)、計画(Plan: 検査/処方/指導/フォロー/受診目安)\n",
            "- 対話にない箇所は「不明」や「未入力」で明記し、推測は明確に注記\n",
            "- 緊急を要する可能性がある所見はPlan内に注意喚起\n"
        ),
        Locale::En => concat!(
            "You are an internal medicine physician. From the conversation below, write a concise but ",
            "comprehensive clinical chart (Markdown) usable in practice.\n",
            "- English, with Markdown headings\n",
            "- Chief complaint (CC), history of present illness (HPI), past medical history, allergies, ",
            "medications, social/family history (as far as known), vitals (\"not measured\" if unknown), ",
            "physical findings (extracted/inferred from the conversation), differential diagnosis, ",
            "assessment, plan (tests/prescriptions/education/follow-up/when to seek care)\n",
            "- State \"unknown\" or \"not provided\" for anything absent from the conversation, and mark inferences clearly\n",
            "- Flag findings that may need urgent attention inside the Plan\n"
        ),
    }
}

fn note_request(transcript: &str, locale: Locale) -> String {
    match locale {
        Locale::Ja => format!(
            "【対話履歴】\n{transcript}\n\n以上を踏まえて、見出し付きMarkdownの内科カルテを書いてください。"
        ),
        Locale::En => format!(
            "[Conversation]\n{transcript}\n\nBased on the above, write an internal medicine chart in Markdown with headings."
        ),
    }
}

/// Fixed chart skeleton used when no provider is configured.
pub fn template_note(
    chief_complaint: Option<&str>,
    created_at: DateTime<Utc>,
    locale: Locale,
) -> String {
    let stamp = created_at.format("%Y-%m-%d %H:%M UTC");
    match locale {
        Locale::Ja => format!(
            "# 内科カルテ\n\n\
             **主訴**: {}\n\n\
             **現病歴**: （チャット内容をもとに要約）\n\n\
             **既往歴**: \n\n\
             **アレルギー**: \n\n\
             **内服薬**: \n\n\
             **身体所見**: \n\n\
             **鑑別診断**: \n\n\
             **評価**: \n\n\
             **Plan**: 検査/処方/指導/フォローアップ\n\n\
             ---\n作成時刻: {stamp}",
            chief_complaint.unwrap_or("（未入力）")
        ),
        Locale::En => format!(
            "# Internal Medicine Chart\n\n\
             **Chief complaint**: {}\n\n\
             **History of present illness**: (summarize from the chat)\n\n\
             **Past medical history**: \n\n\
             **Allergies**: \n\n\
             **Medications**: \n\n\
             **Physical findings**: \n\n\
             **Differential diagnosis**: \n\n\
             **Assessment**: \n\n\
             **Plan**: tests/prescriptions/education/follow-up\n\n\
             ---\nCreated: {stamp}",
            chief_complaint.unwrap_or("(not provided)")
        ),
    }
}

// ═══════════════════════════════════════════════════════════
// Synthesis
// ═══════════════════════════════════════════════════════════

/// Build the clinical note for a transcript.
///
/// Provider failures are returned as errors; the template is only used
/// when no provider is configured at all.
pub async fn synthesize(
    client: Option<&OpenAiClient>,
    history: &[HistoryEntry],
    locale: Locale,
) -> Result<ClinicalNote, NoteError> {
    let chief_complaint = extract_chief_complaint(history);
    let created_at = Utc::now();

    let note_md = match client {
        Some(client) => {
            let transcript = render_transcript(history, locale);
            let messages = [
                ChatMessage::new(MessageRole::System, note_system_prompt(locale)),
                ChatMessage::new(MessageRole::User, note_request(&transcript, locale)),
            ];
            tracing::info!(model = %client.model(), messages = history.len(), "Requesting clinical note");
            let note = client.complete(&messages, NOTE_TEMPERATURE).await?;
            if note.trim().is_empty() {
                return Err(NoteError::EmptyNote);
            }
            note
        }
        None => {
            tracing::debug!(messages = history.len(), "Rendering template clinical note");
            template_note(chief_complaint.as_deref(), created_at, locale)
        }
    };

    Ok(ClinicalNote {
        note_md,
        chief_complaint,
        created_at,
    })
}
