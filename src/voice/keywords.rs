//! Whole-utterance trigger phrases, lowercase. Tables are scanned in order and
//! matched by substring containment, so longer phrases sit before the shorter
//! phrases they contain.

/// "Submit / save / create task" in the supported recognition languages.
pub const SUBMIT_PHRASES: &[&str] = &[
    // English
    "submit task",
    "save task",
    "create task",
    "add task",
    "submit",
    "save",
    // Spanish
    "guardar tarea",
    "crear tarea",
    "guardar",
    "enviar",
    // French
    "enregistrer la tâche",
    "créer la tâche",
    "enregistrer",
    "sauvegarder",
    // German
    "aufgabe speichern",
    "aufgabe erstellen",
    "speichern",
    // Italian, Portuguese
    "salva attività",
    "salvar tarefa",
    "criar tarefa",
    "salvare",
    "salvar",
    "salva",
    // Dutch
    "taak opslaan",
    "opslaan",
    // Russian
    "сохранить задачу",
    "создать задачу",
    "сохранить",
    // Ukrainian
    "зберегти",
    // Polish
    "zapisz zadanie",
    "zapisz",
    // Turkish
    "görevi kaydet",
    "kaydet",
    // Swedish
    "spara uppgift",
    "spara",
    // Indonesian
    "simpan tugas",
    "simpan",
    // Vietnamese
    "lưu nhiệm vụ",
    // Japanese
    "タスクを保存",
    "保存して",
    "送信",
    // Chinese
    "保存任务",
    "创建任务",
    "提交",
    "保存",
    // Korean
    "작업 저장",
    "저장",
    "제출",
    // Arabic
    "حفظ المهمة",
    "حفظ",
    // Hindi
    "कार्य सहेजें",
    "सहेजें",
];

/// "Description / details / notes" in the supported recognition languages.
pub const DESCRIPTION_PHRASES: &[&str] = &[
    // English
    "description",
    "details",
    "notes",
    // Spanish
    "descripción",
    "detalles",
    "notas",
    // French
    "détails",
    // German
    "beschreibung",
    "notizen",
    // Italian
    "descrizione",
    "dettagli",
    // Portuguese
    "descrição",
    "detalhes",
    // Dutch
    "beschrijving",
    "notities",
    // Russian
    "описание",
    "заметки",
    // Ukrainian
    "опис",
    // Polish
    "opis",
    "notatki",
    // Turkish
    "açıklama",
    // Swedish
    "beskrivning",
    "anteckningar",
    // Indonesian
    "deskripsi",
    // Vietnamese
    "mô tả",
    // Chinese
    "描述",
    "备注",
    // Japanese
    "説明",
    "詳細",
    // Korean
    "설명",
    "메모",
    // Arabic
    "وصف",
    "تفاصيل",
    // Hindi
    "विवरण",
];

/// Words dropped along with a trigger phrase.
pub const FILLER_WORDS: &[&str] = &[
    "please", "now", "task", "the", "is", "are", "por favor", "tarea", "s'il vous plaît",
    "tâche", "bitte", "aufgabe", "per favore", "tarefa", "пожалуйста", "задачу", "proszę",
    "lütfen", "请", "ください",
];

/// Words that end a dictated value without belonging to it.
pub const TRAILING_CONNECTORS: &[&str] = &["and", "then", "also", "y", "et", "und"];

/// First phrase in `table` contained in the lowercased transcript.
pub fn find_phrase(table: &'static [&'static str], lowered: &str) -> Option<&'static str> {
    table.iter().copied().find(|phrase| lowered.contains(phrase))
}
