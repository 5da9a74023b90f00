//! Localized policy texts: safety preamble, canned follow-up, placeholders
//! and clinical-note wording. Japanese is the primary product locale.

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Ja,
    En,
}

impl Locale {
    /// BCP 47 tag reported to clients.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ja => "ja-JP",
            Self::En => "en-US",
        }
    }

    /// Fixed system preamble sent ahead of every consultation prompt.
    pub fn intake_system_prompt(&self) -> &'static str {
        match self {
            Self::Ja => concat!(
                "あなたは症状聴取を行う医師ボットです。診断は行わず、危険サインがあれば受診勧奨を行います。",
                "過度な断定は避け、分かりやすく短い文で質問を重ねてください。",
                "緊急性が高い可能性（激しい胸痛、呼吸困難、意識障害 等）がある場合は直ちに119番通報を案内してください。"
            ),
            Self::En => concat!(
                "You are a physician bot taking a symptom history. Do not diagnose; if there are danger signs, ",
                "recommend that the patient seek care. Avoid overly definitive statements and keep asking ",
                "short, easy-to-understand questions. If an emergency is possible (severe chest pain, ",
                "difficulty breathing, impaired consciousness, etc.), tell the patient to call emergency services immediately."
            ),
        }
    }

    /// Canned follow-up question streamed when no provider is configured.
    pub fn fallback_follow_up(&self) -> &'static str {
        match self {
            Self::Ja => concat!(
                "それはいつ頃から、どのような状況で症状が出ますか？\n",
                "痛みの強さ（0〜10）、持続時間、増悪・寛解因子（動くと痛い/安静で軽くなる等）も教えてください。"
            ),
            Self::En => concat!(
                "Since when, and in what situations, do the symptoms appear?\n",
                "Please also tell me the pain intensity (0-10), how long it lasts, and what makes it ",
                "worse or better (hurts when moving / eases with rest, etc.)."
            ),
        }
    }

    /// Stored as the assistant turn when generation produced only whitespace.
    pub fn no_answer_placeholder(&self) -> &'static str {
        match self {
            Self::Ja => "（応答が生成できませんでした）",
            Self::En => "(No response could be generated)",
        }
    }

    /// Greeting shown before the patient types anything.
    pub fn first_message(&self) -> &'static str {
        match self {
            Self::Ja => "本日はどうなさいましたか？",
            Self::En => "What brings you in today?",
        }
    }

    pub fn speaker_label(&self, role: crate::models::enums::MessageRole) -> &'static str {
        use crate::models::enums::MessageRole;
        match (self, role) {
            (Self::Ja, MessageRole::User) => "患者",
            (Self::Ja, MessageRole::Assistant) => "AI",
            (Self::Ja, MessageRole::System) => "システム",
            (Self::En, MessageRole::User) => "Patient",
            (Self::En, MessageRole::Assistant) => "AI",
            (Self::En, MessageRole::System) => "System",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ja" | "ja-jp" => Ok(Self::Ja),
            "en" | "en-us" | "en-gb" => Ok(Self::En),
            other => Err(format!("unsupported locale: {other}")),
        }
    }
}
