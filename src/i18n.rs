
use std::sync::Mutex;
use lazy_static::lazy_static;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Language {
    En,
    Zh,
}

lazy_static! {
    static ref CURRENT_LANG: Mutex<Language> = Mutex::new(Language::Zh); // Default to Chinese
}

pub fn set_language(lang: Language) {
    if let Ok(mut current) = CURRENT_LANG.lock() {
        *current = lang;
    }
}

pub fn get_language() -> Language {
    CURRENT_LANG.lock().map(|l| *l).unwrap_or(Language::Zh)
}

pub fn t(key: &str) -> String {
    let val = match get_language() {
        Language::En => get_en(key),
        Language::Zh => get_zh(key),
    };
    if val.is_empty() {
        key.to_string()
    } else {
        val.to_string()
    }
}

/// `t` with positional `{0}`, `{1}`... placeholders filled in.
pub fn tf(key: &str, args: &[&str]) -> String {
    args.iter()
        .enumerate()
        .fold(t(key), |text, (i, arg)| text.replace(&format!("{{{}}}", i), arg))
}

/// User-visible status line of the practice screen.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusMessage {
    Empty,
    OpeningPicker,
    Importing,
    ImportCancelled,
    ImportTimedOut,
    Imported(String),
    ImportFailed(String),
    ImportRequired,
    InputInvalid(String),
    Playing { current: u32, total: u32 },
    Paused { current: u32, total: u32 },
    Stopped,
    Completed,
    PlaybackFailed(String),
    MarkStartRejected(f64),
    MarkEndRejected(f64),
}

impl StatusMessage {
    pub fn render(&self) -> String {
        match self {
            StatusMessage::Empty => String::new(),
            StatusMessage::OpeningPicker => t("opening_picker"),
            StatusMessage::Importing => t("importing"),
            StatusMessage::ImportCancelled => t("import_cancelled"),
            StatusMessage::ImportTimedOut => t("import_timeout"),
            StatusMessage::Imported(name) => tf("imported", &[name.as_str()]),
            StatusMessage::ImportFailed(reason) => tf("import_failed", &[reason.as_str()]),
            StatusMessage::ImportRequired => t("import_required"),
            StatusMessage::InputInvalid(reason) => tf("input_invalid", &[reason.as_str()]),
            StatusMessage::Playing { current, total } => {
                tf("playing", &[current.to_string().as_str(), total.to_string().as_str()])
            }
            StatusMessage::Paused { current, total } => {
                tf("paused", &[current.to_string().as_str(), total.to_string().as_str()])
            }
            StatusMessage::Stopped => t("stopped"),
            StatusMessage::Completed => t("completed"),
            StatusMessage::PlaybackFailed(reason) => tf("playback_failed", &[reason.as_str()]),
            StatusMessage::MarkStartRejected(pos) => tf("mark_start_rejected", &[format!("{:.1}", pos).as_str()]),
            StatusMessage::MarkEndRejected(pos) => tf("mark_end_rejected", &[format!("{:.1}", pos).as_str()]),
        }
    }
}

fn get_zh(key: &str) -> &'static str {
    match key {
        "app_title" => "循环听力练习",
        "import" => "导入文件...",
        "drag_drop" => "拖拽音频文件到此处",
        "opening_picker" => "正在打开文件选择器...",
        "importing" => "正在加载文件（可能需要下载）...",
        "import_cancelled" => "导入已取消",
        "import_timeout" => "导入超时，请检查网络或确保文件已下载",
        "imported" => "文件已导入: {0}",
        "import_failed" => "导入失败，请检查文件: {0}",
        "import_required" => "请先导入音频",
        "input_invalid" => "请检查输入: {0}",
        "playing" => "正在播放 (第 {0} 次 / {1})",
        "paused" => "已暂停 (第 {0} 次 / {1})",
        "stopped" => "已停止",
        "completed" => "播放完成",
        "playback_failed" => "播放失败: {0}",
        "mark_start_rejected" => "无法将 {0} 秒设为开始时间：不早于结束时间",
        "mark_end_rejected" => "无法将 {0} 秒设为结束时间：不晚于开始时间",
        "start_time" => "开始时间 (秒)",
        "end_time" => "结束时间 (秒)",
        "loop_count" => "循环次数",
        "speed" => "播放速度",
        "volume_boost" => "音量增益",
        "play" => "播放",
        "pause" => "暂停",
        "stop" => "停止",
        "mark_start" => "打点开始",
        "mark_end" => "打点结束",
        "reset_time" => "重置时间",
        "notes" => "音频文本",
        "notes_hint" => "在此输入或粘贴音频文本",
        "clear_notes" => "清空文本",
        _ => "",
    }
}

fn get_en(key: &str) -> &'static str {
    match key {
        "app_title" => "Loop Listening Practice",
        "import" => "Import File...",
        "drag_drop" => "Drag & Drop Audio File Here",
        "opening_picker" => "Opening file picker...",
        "importing" => "Loading file (it may need to download)...",
        "import_cancelled" => "Import cancelled",
        "import_timeout" => "Import timed out. Check the network or make sure the file is downloaded",
        "imported" => "Imported: {0}",
        "import_failed" => "Import failed, check the file: {0}",
        "import_required" => "Import an audio file first",
        "input_invalid" => "Please check the input: {0}",
        "playing" => "Playing (loop {0} of {1})",
        "paused" => "Paused (loop {0} of {1})",
        "stopped" => "Stopped",
        "completed" => "Playback complete",
        "playback_failed" => "Playback failed: {0}",
        "mark_start_rejected" => "Cannot set start to {0}s: not before the end time",
        "mark_end_rejected" => "Cannot set end to {0}s: not after the start time",
        "start_time" => "Start (s)",
        "end_time" => "End (s)",
        "loop_count" => "Loops",
        "speed" => "Speed",
        "volume_boost" => "Volume Boost",
        "play" => "Play",
        "pause" => "Pause",
        "stop" => "Stop",
        "mark_start" => "Mark Start",
        "mark_end" => "Mark End",
        "reset_time" => "Reset Times",
        "notes" => "Transcript",
        "notes_hint" => "Type or paste the audio transcript here",
        "clear_notes" => "Clear Text",
        _ => "",
    }
}
