//! Prompt tables and rendering.

use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

use crate::error::{AnalysisError, Result};
use crate::manual::m_position_section;
use crate::types::{AgeBracket, ChildInfo, PromptPair, Step1Result};

/// Mode used when none is given or the given one is unknown.
pub const DEFAULT_MODE: &str = "verified";
pub const QUICK_MODE: &str = "quick";
/// The built-in staged mode.
pub const STAGED_MODE: &str = "twoStep";

const NOT_DETECTED: &str = "не определено";

/// Closing block shared by every full report.
pub const SUMMARY_SECTION: &str = "## ИТОГ\n\n\
**Оценка:** X/10\n\
**Статус:** 🟢 БЕЗОПАСНО / 🟡 КОРРЕКТИРОВКА / 🔴 ОПАСНО\n\n\
**✅ Хорошо:**\n\
**❌ Исправить:**\n\
**📋 Действия:**";

const LANGUAGE_RULE: &str = "ЯЗЫК: Только \"взрослый\", \"родитель\" (не мама/папа).";

/// Replace `{key}` placeholders with values.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{}}}", key);
        rendered = rendered.replace(&placeholder, value);
    }
    rendered
}

/// Second-stage prompts, parameterized by the first stage's findings.
///
/// The user template may use `{position}`, `{legs}`, `{age}` and
/// `{m_position}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step2Template {
    pub system: String,
    pub user: String,
}

impl Step2Template {
    /// Render from a parsed step-1 response.
    pub fn render(&self, step1: &Step1Result) -> PromptPair {
        let age = AgeBracket::from_str(&step1.age).ok();
        self.render_fields(&step1.position, &step1.legs, &step1.age, age)
    }

    /// Render from explicit values. Blank values read as "не определено".
    ///
    /// `age` drives the M-position section; `age_text` is what is shown.
    pub fn render_fields(
        &self,
        position: &str,
        legs: &str,
        age_text: &str,
        age: Option<AgeBracket>,
    ) -> PromptPair {
        let or_unknown = |value: &str| {
            let value = value.trim();
            if value.is_empty() {
                NOT_DETECTED.to_string()
            } else {
                value.to_string()
            }
        };
        let known_legs = Some(legs.trim()).filter(|l| !l.is_empty());
        let m_position = m_position_section(age, known_legs);

        let position = or_unknown(position);
        let legs = or_unknown(legs);
        let age_text = or_unknown(age_text);
        let user = render(
            &self.user,
            &[
                ("position", position.as_str()),
                ("legs", legs.as_str()),
                ("age", age_text.as_str()),
                ("m_position", m_position.as_str()),
            ],
        );
        PromptPair::new(self.system.clone(), user)
    }
}

/// Prompts for a two-round-trip analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPrompts {
    pub step1: PromptPair,
    pub step2: Step2Template,
}

/// What a mode resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPrompts {
    Single(PromptPair),
    Staged(StagedPrompts),
}

/// Looks up prompts by analysis mode.
#[derive(Debug, Clone)]
pub struct PromptResolver {
    modes: BTreeMap<String, ResolvedPrompts>,
    default_mode: String,
}

impl Default for PromptResolver {
    fn default() -> Self {
        Self {
            modes: builtin_modes(),
            default_mode: DEFAULT_MODE.to_string(),
        }
    }
}

impl PromptResolver {
    /// Built-in table with a different fallback mode.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `default_mode` is not in the table.
    pub fn with_default_mode(mut self, default_mode: impl Into<String>) -> Result<Self> {
        let default_mode = default_mode.into();
        if !self.modes.contains_key(&default_mode) {
            return Err(AnalysisError::InvalidConfig(format!(
                "default mode '{}' has no prompts",
                default_mode
            )));
        }
        self.default_mode = default_mode;
        Ok(self)
    }

    /// Register or replace a mode.
    pub fn with_mode(mut self, mode: impl Into<String>, prompts: ResolvedPrompts) -> Self {
        self.modes.insert(mode.into(), prompts);
        self
    }

    pub fn default_mode(&self) -> &str {
        &self.default_mode
    }

    /// Mode names in sorted order.
    pub fn modes(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }

    /// Strict lookup.
    pub fn lookup(&self, mode: &str) -> Result<&ResolvedPrompts> {
        self.modes
            .get(mode)
            .ok_or_else(|| AnalysisError::UnknownMode(mode.to_string()))
    }

    /// Prompts for `mode`, or the override when one is given.
    ///
    /// An unknown mode logs a warning and falls back to the default mode.
    pub fn resolve(&self, mode: &str, prompt_override: Option<&PromptPair>) -> ResolvedPrompts {
        if let Some(pair) = prompt_override {
            return ResolvedPrompts::Single(pair.clone());
        }

        match self.lookup(mode) {
            Ok(prompts) => prompts.clone(),
            Err(e) => {
                warn!(
                    mode,
                    fallback = %self.default_mode,
                    "PROMPTS: {}, using default",
                    e
                );
                self.default_prompts()
            }
        }
    }

    fn default_prompts(&self) -> ResolvedPrompts {
        self.modes
            .get(&self.default_mode)
            .cloned()
            .unwrap_or_else(|| ResolvedPrompts::Single(verified_prompts()))
    }

    /// The second-stage template of the built-in staged mode.
    pub fn step2_template(&self) -> Result<&Step2Template> {
        match self.lookup(STAGED_MODE)? {
            ResolvedPrompts::Staged(staged) => Ok(&staged.step2),
            ResolvedPrompts::Single(_) => Err(AnalysisError::InvalidConfig(format!(
                "mode '{}' is not staged",
                STAGED_MODE
            ))),
        }
    }
}

/// Append the photo listing used by the multi-image flows.
pub fn with_photo_listing(system: &str, labels: &[String]) -> String {
    format!(
        "{}\n\n📷 ФОТО ДЛЯ АНАЛИЗА ({} шт.): {}\n\
         Анализируй ВСЕ предоставленные фото комплексно, сопоставляя информацию с разных ракурсов.",
        system,
        labels.len(),
        labels.join(", ")
    )
}

/// Prepend advisory child details to a user prompt.
pub fn with_child_info(user: &str, info: &ChildInfo) -> String {
    let present = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut lines = Vec::new();
    if let Some(age) = present(&info.age) {
        lines.push(format!("- Возраст: {}", age));
    }
    if let Some(weight) = present(&info.weight) {
        lines.push(format!("- Вес: {} кг", weight));
    }
    if lines.is_empty() {
        return user.to_string();
    }

    format!(
        "📋 ИНФОРМАЦИЯ О РЕБЁНКЕ:\n{}\n\n\
         Учитывай эту информацию при анализе соответствия переноски возрасту и весу ребёнка.\n\n{}",
        lines.join("\n"),
        user
    )
}

fn builtin_modes() -> BTreeMap<String, ResolvedPrompts> {
    let mut modes = BTreeMap::new();
    modes.insert(
        DEFAULT_MODE.to_string(),
        ResolvedPrompts::Single(verified_prompts()),
    );
    modes.insert(
        QUICK_MODE.to_string(),
        ResolvedPrompts::Single(quick_prompts()),
    );
    modes.insert(
        STAGED_MODE.to_string(),
        ResolvedPrompts::Staged(staged_prompts()),
    );
    modes
}

fn verified_prompts() -> PromptPair {
    let system = format!(
        "Вы — консультант по слингоношению. Оцениваете безопасность ношения ребёнка \
         в слинге или эргорюкзаке по фотографии.\n\n\
         ПОРЯДОК РАБОТЫ:\n\
         1. Сначала определите ракурс фото, где находится ребёнок и куда он смотрит.\n\
         2. Определите позицию: Спереди, На бедре, На спине (Рюкзак), Лицом вперёд.\n\
         3. Определите возрастную группу:\n{}\n\
         4. Только после этого проверяйте критерии T.I.C.K.S.\n\n\
         Для ДОШКОЛЬНИКОВ и ШКОЛЬНИКОВ критерий М-позиции НЕ применяется.\n\
         Не придумывайте детали, которых не видно на фото; если критерий не оценить, так и напишите.\n\n\
         {}",
        age_lines(),
        LANGUAGE_RULE
    );

    let user = format!(
        "## АНАЛИЗ СЛИНГОНОШЕНИЯ\n\n\
         ### ЧТО НА ФОТО\n\
         **Ракурс:** [спереди / сбоку / сзади]\n\
         **Позиция:** [ответ]\n\
         **Возраст:** [ответ]\n\n\
         ### T.I.C.K.S. АНАЛИЗ:\n\n\
         #### T — Плотность\n[переноска плотно прилегает, ребёнок не провисает]\n\n\
         #### I — Видимость лица\n[лицо видно взрослому без поворота головы]\n\n\
         #### C — Высота\n[макушку можно поцеловать, наклонив голову]\n\n\
         #### K — Подбородок\n[между подбородком и грудью есть зазор]\n\n\
         #### S — Поддержка спины\n[спина поддержана в естественном положении]\n\n\
         ### М-ПОЗИЦИЯ:\n[для младенцев и тоддлеров: колени выше попы, ноги разведены; \
         для дошкольников и школьников напишите «не применимо»]\n\n\
         ---\n\n\
         {}",
        SUMMARY_SECTION
    );

    PromptPair::new(system, user)
}

fn quick_prompts() -> PromptPair {
    let system = format!(
        "Вы — консультант по слингоношению. Дайте короткую оценку безопасности \
         ношения по фото: не больше 5 пунктов.\n\
         Для ДОШКОЛЬНИКОВ и ШКОЛЬНИКОВ М-позиция не оценивается.\n\n\
         {}",
        LANGUAGE_RULE
    );
    let user = "## БЫСТРАЯ ПРОВЕРКА\n\n\
                **Позиция:** [ответ]\n\
                **Статус:** 🟢 БЕЗОПАСНО / 🟡 КОРРЕКТИРОВКА / 🔴 ОПАСНО\n\n\
                **Главное замечание:** [одно предложение]\n\
                **Что сделать:** [1-3 коротких пункта]"
        .to_string();
    PromptPair::new(system, user)
}

fn staged_prompts() -> StagedPrompts {
    let step1_system = format!(
        "Вы — консультант по слингоношению. Ваша единственная задача на этом этапе — \
         определить, КАК ребёнок находится в переноске. Безопасность пока НЕ оценивайте.\n\n\
         ВОЗРАСТНЫЕ ГРУППЫ:\n{}\n\n\
         Отвечайте строго в формате из запроса, по одному полю на строку.",
        age_lines()
    );
    let step1_user = "Определите по фото:\n\n\
                      РАКУРС: [спереди / сбоку / сзади]\n\
                      РЕБЁНОК_ГДЕ: [на груди / на бедре / на спине взрослого]\n\
                      РЕБЁНОК_КУДА_СМОТРИТ: [к взрослому / вперёд / в сторону]\n\
                      ВОЗРАСТ: [МЛАДЕНЕЦ / МАЛЫШ / ТОДДЛЕР / ДОШКОЛЬНИК / ШКОЛЬНИК]\n\
                      НОГИ: [М-позиция / СВИСАЮТ / не видно]\n\
                      ПОЗИЦИЯ: [Спереди / На бедре / Рюкзак / Лицом вперёд]"
        .to_string();

    let step2_system = format!(
        "Вы — консультант по слингоношению.\n\
         Позиция, возраст и положение ног ребёнка УЖЕ ОПРЕДЕЛЕНЫ на предыдущем этапе.\n\
         НЕ ПЫТАЙТЕСЬ их переопределить — используйте данные из запроса.\n\
         Если возраст ДОШКОЛЬНИК или ШКОЛЬНИК — М-позиция НЕ ПРИМЕНИМА, оценивайте только \
         безопасность и комфорт.\n\n\
         {}",
        LANGUAGE_RULE
    );
    let step2_user = format!(
        "## ПОЛНЫЙ АНАЛИЗ СЛИНГОНОШЕНИЯ\n\n\
         **Позиция:** {{position}}\n\
         **Возраст:** {{age}}\n\
         **Ноги:** {{legs}}\n\n\
         ### T.I.C.K.S. АНАЛИЗ:\n\n\
         #### T — Плотность\n[оцени]\n\n\
         #### I — Видимость лица\n[оцени]\n\n\
         #### C — Высота\n[оцени]\n\n\
         #### K — Подбородок\n[оцени]\n\n\
         #### S — Поддержка спины\n[оцени]\n\n\
         {{m_position}}\n\n\
         ---\n\n\
         {}",
        SUMMARY_SECTION
    );

    StagedPrompts {
        step1: PromptPair::new(step1_system, step1_user),
        step2: Step2Template {
            system: step2_system,
            user: step2_user,
        },
    }
}

fn age_lines() -> String {
    AgeBracket::ALL
        .iter()
        .map(|bracket| format!("- {} — {}", bracket.label(), bracket.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manual::{M_POSITION_DANGLING, M_POSITION_DETECT, M_POSITION_OK};

    fn staged(resolver: &PromptResolver) -> StagedPrompts {
        match resolver.resolve(STAGED_MODE, None) {
            ResolvedPrompts::Staged(staged) => staged,
            other => panic!("Expected staged prompts, got {:?}", other),
        }
    }

    #[test]
    fn render_replaces_placeholders() {
        let result = render("{a} и {b}, снова {a}", &[("a", "раз"), ("b", "два")]);
        assert_eq!(result, "раз и два, снова раз");
        assert_eq!(render("без подстановок", &[]), "без подстановок");
    }

    #[test]
    fn builtin_modes_resolve() {
        let resolver = PromptResolver::default();
        let modes: Vec<_> = resolver.modes().collect();
        assert_eq!(modes, vec!["quick", "twoStep", "verified"]);

        assert!(matches!(
            resolver.resolve("quick", None),
            ResolvedPrompts::Single(_)
        ));
        assert!(matches!(
            resolver.resolve(DEFAULT_MODE, None),
            ResolvedPrompts::Single(_)
        ));
        staged(&resolver);
    }

    #[test]
    fn override_wins_for_every_mode() {
        let resolver = PromptResolver::default();
        let custom = PromptPair::new("свой system", "свой user");
        for mode in ["verified", "quick", "twoStep", "nonexistent"] {
            assert_eq!(
                resolver.resolve(mode, Some(&custom)),
                ResolvedPrompts::Single(custom.clone())
            );
        }
    }

    #[test]
    fn unknown_mode_falls_back_to_default() {
        let resolver = PromptResolver::default();
        assert!(matches!(
            resolver.lookup("deep"),
            Err(AnalysisError::UnknownMode(_))
        ));
        assert_eq!(
            resolver.resolve("deep", None),
            resolver.resolve(DEFAULT_MODE, None)
        );
    }

    #[test]
    fn default_mode_must_exist() {
        assert!(PromptResolver::default().with_default_mode("quick").is_ok());
        assert!(matches!(
            PromptResolver::default().with_default_mode("deep"),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn step2_render_substitutes_step1_fields() {
        let resolver = PromptResolver::default();
        let step1 = Step1Result {
            position: "Рюкзак".to_string(),
            legs: "М-позиция".to_string(),
            age: "ТОДДЛЕР".to_string(),
            ..Default::default()
        };
        let prompts = staged(&resolver).step2.render(&step1);

        assert!(prompts.user.contains("**Позиция:** Рюкзак"));
        assert!(prompts.user.contains("**Ноги:** М-позиция"));
        assert!(prompts.user.contains("**Возраст:** ТОДДЛЕР"));
        assert!(prompts.user.contains(M_POSITION_OK));
        assert!(!prompts.user.contains('{'));
    }

    #[test]
    fn step2_render_for_older_child_omits_leg_spread() {
        let template = PromptResolver::default().step2_template().unwrap().clone();
        let prompts = template.render_fields(
            "Рюкзак",
            "СВИСАЮТ",
            "ШКОЛЬНИК",
            Some(AgeBracket::Schooler),
        );
        for marker in [M_POSITION_DETECT, M_POSITION_OK, M_POSITION_DANGLING] {
            assert!(!prompts.user.contains(marker));
        }
    }

    #[test]
    fn step2_template_has_no_redetection_instructions() {
        let template = PromptResolver::default().step2_template().unwrap().clone();
        let prompts =
            template.render_fields("Спереди", "СВИСАЮТ", "МЛАДЕНЕЦ", Some(AgeBracket::Infant));
        let text = format!("{}\n{}", prompts.system, prompts.user);

        for phrase in ["определите по фото", "ОПРЕДЕЛЕНИЕ ВОЗРАСТА", M_POSITION_DETECT] {
            assert!(!text.contains(phrase), "found '{}'", phrase);
        }
        assert!(prompts.user.contains(M_POSITION_DANGLING));
    }

    #[test]
    fn step2_render_marks_blank_fields() {
        let template = PromptResolver::default().step2_template().unwrap().clone();
        let prompts = template.render(&Step1Result::default());
        assert!(prompts.user.contains("**Позиция:** не определено"));
        assert!(prompts.user.contains(M_POSITION_DETECT));
    }

    #[test]
    fn photo_listing_contains_labels_and_count() {
        let labels = vec!["спереди".to_string(), "сбоку".to_string(), "сзади".to_string()];
        let system = with_photo_listing("SYS", &labels);
        assert!(system.starts_with("SYS\n\n📷 ФОТО ДЛЯ АНАЛИЗА (3 шт.): спереди, сбоку, сзади"));
    }

    #[test]
    fn child_info_is_prepended_when_present() {
        let info = ChildInfo {
            age: Some("8 мес".to_string()),
            weight: Some("9".to_string()),
        };
        let user = with_child_info("USER", &info);
        assert!(user.starts_with("📋 ИНФОРМАЦИЯ О РЕБЁНКЕ:\n- Возраст: 8 мес\n- Вес: 9 кг\n\n"));
        assert!(user.ends_with("\n\nUSER"));

        assert_eq!(with_child_info("USER", &ChildInfo::default()), "USER");
    }
}
