/*
Message templates for notifications produced by this service.

- An embedded translations store (compile-time JSON), English and Amharic.
- `tr` looks up a key for a language with `{name}` placeholder substitution.
- `t` / `t_with` use DEFAULT_LANG.

Usage:
    let title = i18n::t("study_reminder.title");
    let body = i18n::t_with("study_reminder.message", &[("minutes", "30")]);

If a key is missing for the requested language the default language is used,
and if it is missing there too the key itself is returned.
*/

use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANG: &str = "en";

static TRANSLATIONS: OnceLock<HashMap<String, HashMap<String, String>>> = OnceLock::new();

const EN_JSON: &str = r#"
{
  "study_reminder.title": "Time to study! 📚",
  "study_reminder.message": "Your {minutes}-minute study session is starting. Keep up the practice for your driving exam!",
  "weekly_report.title": "Your weekly progress report 📊",
  "weekly_report.message": "This week you took {taken} exams and passed {passed}, with an average score of {average}%. Keep going!",
  "validation.reminder_time": "Reminder time must be in HH:MM format",
  "validation.days_of_week": "Days of week must be a non-empty list of weekday names",
  "validation.study_goal": "Study goal must be between {min} and {max} minutes",
  "validation.timezone": "Unknown timezone: {tz}",
  "validation.quiet_hours": "Quiet hours must be in HH:MM format",
  "validation.language": "Unsupported language: {lang}",
  "conflict.reminder_exists": "An active study reminder already exists for this user",
  "not_found.reminder": "Study reminder not found",
  "not_found.notification": "Notification not found",
  "app.name": "Exam Prep"
}
"#;

const AM_JSON: &str = r#"
{
  "study_reminder.title": "የማጥኛ ሰዓት ደርሷል! 📚",
  "study_reminder.message": "የ{minutes} ደቂቃ የጥናት ጊዜዎ ጀምሯል። ለመንጃ ፈቃድ ፈተናዎ ልምምድዎን ይቀጥሉ!",
  "weekly_report.title": "የሳምንቱ የእድገት ሪፖርትዎ 📊",
  "weekly_report.message": "በዚህ ሳምንት {taken} ፈተናዎችን ወስደው {passed} አልፈዋል፤ አማካይ ውጤት {average}% ነው።",
  "app.name": "Exam Prep"
}
"#;

fn build_translations() -> HashMap<String, HashMap<String, String>> {
    let mut out: HashMap<String, HashMap<String, String>> = HashMap::new();

    let en_map: HashMap<String, String> = serde_json::from_str(EN_JSON).unwrap_or_else(|e| {
        panic!("failed to parse EN_JSON in i18n module: {}", e);
    });
    out.insert("en".to_string(), en_map);

    let am_map: HashMap<String, String> = serde_json::from_str(AM_JSON).unwrap_or_else(|e| {
        panic!("failed to parse AM_JSON in i18n module: {}", e);
    });
    out.insert("am".to_string(), am_map);

    out
}

fn translations() -> &'static HashMap<String, HashMap<String, String>> {
    TRANSLATIONS.get_or_init(build_translations)
}

/// Normalize a language tag into a short, lowercase code (e.g. "en-US" -> "en").
pub fn normalize_language(lang: &str) -> String {
    lang.split('-').next().unwrap_or(lang).to_lowercase()
}

pub fn is_supported_language(lang: &str) -> bool {
    translations().contains_key(lang)
}

/// Translate `key` for `lang` (DEFAULT_LANG if None), substituting `{name}` params.
pub fn tr(lang: Option<&str>, key: &str, params: Option<&[(&str, &str)]>) -> String {
    let map = translations();

    let desired = normalize_language(lang.unwrap_or(DEFAULT_LANG));

    let val = map
        .get(&desired)
        .and_then(|m| m.get(key))
        .cloned()
        .or_else(|| map.get(DEFAULT_LANG).and_then(|m| m.get(key)).cloned())
        .unwrap_or_else(|| key.to_string());

    if let Some(params) = params {
        let mut s = val;
        for (k, v) in params {
            s = s.replace(&format!("{{{}}}", k), v);
        }
        s
    } else {
        val
    }
}

pub fn t(key: &str) -> String {
    tr(None, key, None)
}

pub fn t_with(key: &str, params: &[(&str, &str)]) -> String {
    tr(None, key, Some(params))
}
