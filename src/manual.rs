//! Prompts for analysis with a caller-declared carrying position.

use crate::types::{AgeBracket, ManualPosition, PromptPair};

pub const M_POSITION_HEADER: &str = "### М-ПОЗИЦИЯ:";

/// Leg-spread detection instruction for infants and toddlers.
pub const M_POSITION_DETECT: &str =
    "[определи по фото: колени выше/ниже попы, ноги согнуты или свисают]";
pub const M_POSITION_OK: &str = "✅ М-позиция соблюдена.";
pub const M_POSITION_DANGLING: &str = "❌ Ноги свисают — нет М-позиции.";

/// Legs text marker for dangling legs.
pub const LEGS_DANGLING: &str = "СВИСАЮТ";

const ASK_FROM_PHOTO: &str = "определите по фото";

/// The M-position section of a report template.
///
/// Older children never get the leg-spread instruction or verdict.
pub fn m_position_section(age: Option<AgeBracket>, legs: Option<&str>) -> String {
    match (age, legs) {
        (Some(age), _) if age.is_older_child() => format!(
            "{}\n⚠️ Ребёнок {} — критерий М-позиции НЕ ПРИМЕНИМ.\nОцените только комфорт и безопасность.",
            M_POSITION_HEADER, age
        ),
        (_, Some(legs)) if legs.to_uppercase().contains(LEGS_DANGLING) => {
            format!("{}\n{}", M_POSITION_HEADER, M_POSITION_DANGLING)
        }
        (_, Some(_)) => format!("{}\n{}", M_POSITION_HEADER, M_POSITION_OK),
        (None, None) => format!(
            "{}\nЕсли ребёнок ДОШКОЛЬНИК/ШКОЛЬНИК — М-позиция не применима, пропустите этот критерий.\n{}",
            M_POSITION_HEADER, M_POSITION_DETECT
        ),
        (Some(_), None) => format!("{}\n{}", M_POSITION_HEADER, M_POSITION_DETECT),
    }
}

fn age_taxonomy() -> String {
    let lines: Vec<String> = AgeBracket::ALL
        .iter()
        .map(|bracket| format!("- {} ({})", bracket.label(), bracket.description()))
        .collect();
    format!(
        "ОПРЕДЕЛЕНИЕ ВОЗРАСТА:\n{}\n\nДля ДОШКОЛЬНИКОВ и ШКОЛЬНИКОВ М-позиция НЕ применима!",
        lines.join("\n")
    )
}

fn system_prompt(manual: &ManualPosition) -> String {
    let mut sections = vec![format!(
        "Вы — консультант по слингоношению.\n\
         Позиция ребёнка УЖЕ ОПРЕДЕЛЕНА пользователем: {}\n\
         Возраст: {}\n\
         НЕ ПЫТАЙТЕСЬ переопределить позицию — она указана правильно.",
        manual.position,
        manual
            .age
            .map_or_else(|| ASK_FROM_PHOTO.to_string(), |age| age.to_string())
    )];

    match manual.age {
        Some(age) if age.is_older_child() => sections.push(format!(
            "⚠️ ВАЖНО: Ребёнок {} — это НЕ младенец!\n\
             М-позиция НЕ ПРИМЕНИМА для детей этого возраста.\n\
             НЕ давайте советов про ноги и посадку бёдер.\n\
             Оценивайте только безопасность и комфорт.",
            age
        )),
        Some(_) => {}
        None => sections.push(age_taxonomy()),
    }

    sections.push("ЯЗЫК: Только \"взрослый\", \"родитель\" (не мама/папа).".to_string());
    sections.join("\n\n")
}

fn user_prompt(manual: &ManualPosition, photo_count: Option<usize>) -> String {
    let title = match photo_count {
        Some(count) => format!("## АНАЛИЗ СЛИНГОНОШЕНИЯ ({} фото)", count),
        None => "## АНАЛИЗ СЛИНГОНОШЕНИЯ".to_string(),
    };
    let age = manual
        .age
        .map_or_else(|| ASK_FROM_PHOTO.to_string(), |age| age.to_string());
    let legs = manual.legs().unwrap_or(ASK_FROM_PHOTO);

    let age_step = if manual.age.is_none() {
        "### ШАГ 0: ОПРЕДЕЛИ ВОЗРАСТ\n\
         Посмотри на ребёнка — это младенец, малыш, тоддлер или большой ребёнок (дошкольник/школьник)?\n\
         **Возраст:** [ответ]\n\n"
    } else {
        ""
    };

    format!(
        "{title}\n\n\
         **Позиция (указана):** {position}\n\
         **Возраст:** {age}\n\
         **Ноги:** {legs}\n\n\
         {age_step}\
         ### T.I.C.K.S. АНАЛИЗ:\n\n\
         #### T — Плотность\n[оцени]\n\n\
         #### I — Видимость лица\n[оцени]\n\n\
         #### C — Высота\n[оцени]\n\n\
         #### K — Подбородок\n[оцени]\n\n\
         #### S — Поддержка спины\n[оцени]\n\n\
         {m_position}\n\n\
         ---\n\n\
         {summary}",
        title = title,
        position = manual.position,
        age = age,
        legs = legs,
        age_step = age_step,
        m_position = m_position_section(manual.age, manual.legs()),
        summary = crate::prompt::SUMMARY_SECTION,
    )
}

/// Bespoke prompts for a manual position with age or legs left to the model.
///
/// `photo_count` is set for the multi-image flow.
pub fn compose(manual: &ManualPosition, photo_count: Option<usize>) -> PromptPair {
    PromptPair::new(system_prompt(manual), user_prompt(manual, photo_count))
}

/// Header placed above the model's answer in the manual flows.
pub fn result_header(manual: &ManualPosition, photo_count: Option<usize>) -> String {
    let title = match photo_count {
        Some(count) => format!("## 📍 Позиция указана вручную ({} фото)", count),
        None => "## 📍 Позиция указана вручную".to_string(),
    };
    let age = manual
        .age
        .map_or_else(|| "определяет модель".to_string(), |age| age.to_string());
    let legs = manual.legs().unwrap_or("определяет модель");

    format!(
        "{}\n\n**Позиция:** {}\n**Возраст:** {}\n**Ноги:** {}",
        title, manual.position, age, legs
    )
}
