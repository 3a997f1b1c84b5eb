use chrono::NaiveDate;

/// Task types the model may pick from.
pub const TASK_TYPES: [&str; 4] = ["Звонок", "WhatsApp", "Email", "Шоурум"];

const TEMPLATE: &str = r#"Текущая дата: {today}
Проанализируй следующий текст из комментария оператора в CRM. Извлеки из него все задачи, которые нужно создать. Для каждой задачи определи:
1. Тип задачи (выбери один из следующих: {types}).
2. Дату и время выполнения (в формате 'YYYY-MM-DD HH:MM'). Если время не указано, используй '{placeholder}'. Если дата не указана, используй текущую дату.
3. Короткий и понятный текст задачи.
4. Дополнительный комментарий к задаче.
5. Строку комментария, из которой получена задача, дословно.

Важные правила:
- Верни результат в виде массива JSON-объектов.
- Верни ТОЛЬКО JSON-код, без каких-либо пояснений, заголовков или дополнительного текста.
- Если в тексте нет явных задач, верни пустой JSON-массив: [].
- Если в тексте указана только дата без года, используй текущий год.

Пример ответа:
[
  {
    "type": "WhatsApp",
    "date_time": "{today} {placeholder}",
    "task": "Написать клиенту",
    "commentary": "Напомнить о предложении, связанном с акцией на доставку",
    "source_line": "написать в ватсап про акцию"
  }
]

Текст для анализа: "{text}""#;

/// Build the user prompt for one unprocessed comment tail.
///
/// `placeholder` is the time-of-day the model must use when the text names
/// none; the engine recognises it later and replaces it.
pub fn build_prompt(text: &str, today: NaiveDate, placeholder: &str) -> String {
    let types = TASK_TYPES
        .iter()
        .map(|t| format!("'{t}'"))
        .collect::<Vec<_>>()
        .join(", ");
    TEMPLATE
        .replace("{today}", &today.format("%Y-%m-%d").to_string())
        .replace("{types}", &types)
        .replace("{placeholder}", placeholder)
        .replace("{text}", text)
}
