// パス: src/repl/line_editor.rs
// 役割: 履歴・カーソル移動・Tab 補完・強調表示付きの端末行エディタ
// 意図: REPL から渡されるフック（プロンプト / 強調 / 補完）だけを知り、字句やランタイムには依存しない
// 関連ファイル: src/repl/cmd.rs, src/repl/highlight.rs, src/repl/completion.rs
use std::collections::VecDeque;
use std::env;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::errors::ReplError;
use crate::repl::completion::CompletionCandidate;

const HISTORY_LIMIT: usize = 1000;
const HISTORY_ENV: &str = "JSREPL_HISTORY_FILE";

/// 1 回の読み取りの結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    Line(String),
    Eof,
    Interrupted,
}

/// 行の表示と補完を REPL 側に問い合わせるためのフック。
pub trait EditorHooks {
    /// 入力中の行に応じたプロンプト。
    fn prompt(&self, line: &str) -> String;
    /// 端末に描く行（SGR 付きでもよい。文字数は `line` と同じであること）。
    fn highlight(&self, line: &str) -> String;
    /// `cursor` はバイト位置。
    fn complete(&self, line: &str, cursor: usize) -> Vec<CompletionCandidate>;
}

/// 端末が使えれば raw モードで編集し、そうでなければ 1 行ずつ読む。
pub struct LineEditor {
    history: HistoryStore,
}

impl LineEditor {
    pub fn new() -> Self {
        Self {
            history: HistoryStore::open(),
        }
    }

    pub fn read_line(&mut self, prompt: &str, hooks: &dyn EditorHooks) -> Result<ReadResult, ReplError> {
        #[cfg(unix)]
        {
            // SAFETY: 標準入力の記述子を問い合わせるだけ
            if unsafe { libc::isatty(libc::STDIN_FILENO) } == 1 {
                return self.edit_interactively(prompt, hooks).map_err(ReplError::Terminal);
            }
        }
        let _ = hooks;
        read_piped_line(prompt).map_err(ReplError::Terminal)
    }

    pub fn add_history(&mut self, entry: &str) {
        self.history.push(entry);
    }

    pub fn save_history(&self) -> Result<(), ReplError> {
        self.history.persist()
    }
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

fn read_piped_line(prompt: &str) -> io::Result<ReadResult> {
    let mut stdout = io::stdout();
    stdout.write_all(prompt.as_bytes())?;
    stdout.flush()?;
    let mut raw = String::new();
    if io::stdin().lock().read_line(&mut raw)? == 0 {
        return Ok(ReadResult::Eof);
    }
    let line = raw.trim_end_matches(['\n', '\r']).to_string();
    Ok(ReadResult::Line(line))
}

#[cfg(unix)]
impl LineEditor {
    fn edit_interactively(&mut self, prompt: &str, hooks: &dyn EditorHooks) -> io::Result<ReadResult> {
        let _guard = TerminalGuard::enter()?;
        let mut out = io::stdout();
        out.write_all(prompt.as_bytes())?;
        out.flush()?;

        let mut keys = KeyReader::new(io::stdin().lock());
        let mut edit = EditBuffer::new(&self.history);
        loop {
            let Some(key) = keys.next_key()? else {
                return Ok(ReadResult::Eof);
            };
            let redraw = match key {
                Key::Enter => {
                    out.write_all(b"\r\n")?;
                    out.flush()?;
                    return Ok(ReadResult::Line(edit.text));
                }
                Key::CtrlC => {
                    out.write_all(b"^C\r\n")?;
                    out.flush()?;
                    return Ok(ReadResult::Interrupted);
                }
                Key::CtrlD if edit.text.is_empty() => {
                    out.write_all(b"\r\n")?;
                    out.flush()?;
                    return Ok(ReadResult::Eof);
                }
                Key::Tab => {
                    let candidates = hooks.complete(&edit.text, edit.cursor);
                    match edit.complete_with(&candidates) {
                        Completion::Extended => true,
                        Completion::Ambiguous(names) => {
                            write!(out, "\r\n{}\r\n", names.join("  "))?;
                            true
                        }
                        Completion::None => false,
                    }
                }
                other => edit.apply(other),
            };
            if redraw {
                repaint(
                    &mut out,
                    &hooks.prompt(&edit.text),
                    &hooks.highlight(&edit.text),
                    edit.chars_after_cursor(),
                )?;
            }
        }
    }
}

/// 端末から読んだ 1 打鍵。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    CtrlC,
    CtrlD,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    Unknown,
}

/// バイト列を打鍵に変える。`ESC [ x` の 3 バイト列だけを解釈する。
struct KeyReader<R> {
    input: R,
}

impl<R: Read> KeyReader<R> {
    fn new(input: R) -> Self {
        Self { input }
    }

    fn byte(&mut self) -> io::Result<Option<u8>> {
        let mut one = [0u8; 1];
        match self.input.read(&mut one)? {
            0 => Ok(None),
            _ => Ok(Some(one[0])),
        }
    }

    /// 入力が尽きたら `None`。
    fn next_key(&mut self) -> io::Result<Option<Key>> {
        let Some(lead) = self.byte()? else {
            return Ok(None);
        };
        let key = match lead {
            b'\r' | b'\n' => Key::Enter,
            b'\t' => Key::Tab,
            0x01 => Key::Home,
            0x03 => Key::CtrlC,
            0x04 => Key::CtrlD,
            0x05 => Key::End,
            0x08 | 0x7f => Key::Backspace,
            0x1b => self.escape()?,
            0x00..=0x1f => Key::Unknown,
            _ => match self.utf8(lead)? {
                Some(ch) if !ch.is_control() => Key::Char(ch),
                _ => Key::Unknown,
            },
        };
        Ok(Some(key))
    }

    fn escape(&mut self) -> io::Result<Key> {
        if self.byte()? != Some(b'[') {
            return Ok(Key::Unknown);
        }
        Ok(match self.byte()? {
            Some(b'A') => Key::Up,
            Some(b'B') => Key::Down,
            Some(b'C') => Key::Right,
            Some(b'D') => Key::Left,
            Some(b'H') => Key::Home,
            Some(b'F') => Key::End,
            _ => Key::Unknown,
        })
    }

    /// 先頭バイトの上位ビットから後続バイト数を決めて 1 文字を組み立てる。
    fn utf8(&mut self, lead: u8) -> io::Result<Option<char>> {
        let width = match lead.leading_ones() {
            0 => 1,
            n @ 2..=4 => n as usize,
            _ => return Ok(None),
        };
        let mut bytes = vec![lead];
        for _ in 1..width {
            match self.byte()? {
                Some(b) => bytes.push(b),
                None => return Ok(None),
            }
        }
        Ok(std::str::from_utf8(&bytes).ok().and_then(|s| s.chars().next()))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Completion {
    Extended,
    Ambiguous(Vec<String>),
    None,
}

/// 編集中の 1 行。`cursor` は `text` 内のバイト位置で、常に文字境界にある。
struct EditBuffer<'h> {
    text: String,
    cursor: usize,
    history: &'h HistoryStore,
    /// 履歴をたどっている間の位置と、たどる前の入力。
    browsing: Option<(usize, String)>,
}

impl<'h> EditBuffer<'h> {
    fn new(history: &'h HistoryStore) -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            history,
            browsing: None,
        }
    }

    /// 打鍵を反映し、再描画が要るかを返す。
    fn apply(&mut self, key: Key) -> bool {
        match key {
            Key::Char(ch) => {
                self.insert(ch.encode_utf8(&mut [0u8; 4]));
                true
            }
            Key::Backspace => self.backspace(),
            Key::Left => self.step_left(),
            Key::Right => self.step_right(),
            Key::Home => self.jump_to(0),
            Key::End => self.jump_to(self.text.len()),
            Key::Up => self.recall_older(),
            Key::Down => self.recall_newer(),
            _ => false,
        }
    }

    fn insert(&mut self, piece: &str) {
        self.text.insert_str(self.cursor, piece);
        self.cursor += piece.len();
        self.browsing = None;
    }

    fn previous_boundary(&self) -> Option<usize> {
        self.text[..self.cursor].char_indices().next_back().map(|(i, _)| i)
    }

    fn backspace(&mut self) -> bool {
        let Some(start) = self.previous_boundary() else {
            return false;
        };
        self.text.replace_range(start..self.cursor, "");
        self.cursor = start;
        self.browsing = None;
        true
    }

    fn step_left(&mut self) -> bool {
        match self.previous_boundary() {
            Some(start) => {
                self.cursor = start;
                true
            }
            None => false,
        }
    }

    fn step_right(&mut self) -> bool {
        match self.text[self.cursor..].chars().next() {
            Some(ch) => {
                self.cursor += ch.len_utf8();
                true
            }
            None => false,
        }
    }

    fn jump_to(&mut self, cursor: usize) -> bool {
        let moved = self.cursor != cursor;
        self.cursor = cursor;
        moved
    }

    fn chars_after_cursor(&self) -> usize {
        self.text[self.cursor..].chars().count()
    }

    fn show(&mut self, text: String) {
        self.text = text;
        self.cursor = self.text.len();
    }

    fn recall_older(&mut self) -> bool {
        let position = match &self.browsing {
            Some((0, _)) => return false,
            Some((position, _)) => position - 1,
            None if self.history.entries.is_empty() => return false,
            None => self.history.entries.len() - 1,
        };
        let stash = match self.browsing.take() {
            Some((_, stash)) => stash,
            None => self.text.clone(),
        };
        self.show(self.history.entries[position].clone());
        self.browsing = Some((position, stash));
        true
    }

    fn recall_newer(&mut self) -> bool {
        let Some((position, stash)) = self.browsing.take() else {
            return false;
        };
        match self.history.entries.get(position + 1) {
            Some(entry) => {
                self.show(entry.clone());
                self.browsing = Some((position + 1, stash));
            }
            None => self.show(stash),
        }
        true
    }

    /// 候補が 1 つならその残りを挿入する。複数なら共通部分を伸ばし、
    /// 伸ばせなければ一覧を返す。
    fn complete_with(&mut self, candidates: &[CompletionCandidate]) -> Completion {
        let rests: Vec<&str> = candidates
            .iter()
            .map(|c| c.text.get(c.invariant_offset..).unwrap_or(""))
            .collect();
        let Some((first, others)) = rests.split_first() else {
            return Completion::None;
        };
        let mut shared = first.len();
        for other in others {
            shared = first
                .char_indices()
                .zip(other.chars())
                .take_while(|((_, a), b)| a == b)
                .last()
                .map_or(0, |((i, a), _)| i + a.len_utf8())
                .min(shared);
        }
        if shared > 0 {
            self.insert(&first[..shared]);
            return Completion::Extended;
        }
        if others.is_empty() {
            return Completion::None;
        }
        Completion::Ambiguous(candidates.iter().map(|c| c.text.clone()).collect())
    }
}

/// 行頭に戻って行全体を描き直し、カーソルを `back` 文字ぶん左へ戻す。
fn repaint<W: Write>(out: &mut W, prompt: &str, painted: &str, back: usize) -> io::Result<()> {
    write!(out, "\r{prompt}{painted}\x1b[K")?;
    if back > 0 {
        write!(out, "\x1b[{back}D")?;
    }
    out.flush()
}

/// 入力履歴。古いものから並び、上限を超えると先頭から捨てる。
struct HistoryStore {
    entries: VecDeque<String>,
    file: Option<PathBuf>,
    limit: usize,
}

impl HistoryStore {
    /// 履歴ファイルがあれば読む。存在しないのは初回起動として扱う。
    fn open() -> Self {
        let file = history_file();
        let mut store = Self {
            entries: VecDeque::new(),
            file: file.clone(),
            limit: HISTORY_LIMIT,
        };
        let Some(file) = file else {
            return store;
        };
        match fs::read_to_string(&file) {
            Ok(content) => {
                for line in content.lines() {
                    store.push(line);
                }
                debug!(entries = store.entries.len(), "history loaded");
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => warn!(
                "{}",
                ReplError::History {
                    path: file.display().to_string(),
                    source,
                }
            ),
        }
        store
    }

    /// 空行と直前と同じ入力は記録しない。
    fn push(&mut self, entry: &str) {
        let entry = entry.trim();
        if entry.is_empty() || self.entries.back().is_some_and(|last| last == entry) {
            return;
        }
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.to_string());
    }

    fn persist(&self) -> Result<(), ReplError> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let fail = |source| ReplError::History {
            path: file.display().to_string(),
            source,
        };
        if let Some(dir) = file.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(fail)?;
        }
        let body: String = self.entries.iter().map(|e| format!("{e}\n")).collect();
        fs::write(file, body).map_err(fail)
    }
}

/// `JSREPL_HISTORY_FILE` があればそれ、なければホームの `.js-history`。
fn history_file() -> Option<PathBuf> {
    if let Some(path) = env::var_os(HISTORY_ENV) {
        return Some(path.into());
    }
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".js-history"))
}

/// raw モードの間だけ生きるガード。落とすと元の端末設定に戻す。
#[cfg(unix)]
struct TerminalGuard {
    saved: libc::termios,
}

#[cfg(unix)]
impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        let fd = libc::STDIN_FILENO;
        // SAFETY: termios は POD で、tcgetattr が全体を書き込む
        let mut saved: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut saved) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let mut raw = saved;
        // SAFETY: 有効な termios への可変参照を渡す
        unsafe { libc::cfmakeraw(&mut raw) };
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { saved })
    }
}

#[cfg(unix)]
impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // SAFETY: enter で取得した設定をそのまま戻す
        unsafe {
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.saved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    /// 環境変数を触るテストを直列化する。
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn store(entries: &[&str], limit: usize) -> HistoryStore {
        HistoryStore {
            entries: entries.iter().map(|s| s.to_string()).collect(),
            file: None,
            limit,
        }
    }

    fn keys(bytes: &[u8]) -> Vec<Key> {
        let mut reader = KeyReader::new(Cursor::new(bytes.to_vec()));
        let mut out = Vec::new();
        while let Some(key) = reader.next_key().expect("read") {
            out.push(key);
        }
        out
    }

    fn typed<'h>(history: &'h HistoryStore, text: &str) -> EditBuffer<'h> {
        let mut edit = EditBuffer::new(history);
        for ch in text.chars() {
            edit.apply(Key::Char(ch));
        }
        edit
    }

    fn candidate(text: &str, invariant_offset: usize) -> CompletionCandidate {
        CompletionCandidate {
            text: text.to_string(),
            invariant_offset,
        }
    }

    #[test]
    fn history_skips_blank_and_repeated_entries() {
        let mut history = store(&[], 10);
        for entry in ["foo", "foo", "  ", "bar", "foo"] {
            history.push(entry);
        }
        assert_eq!(history.entries, vec!["foo", "bar", "foo"]);
    }

    #[test]
    fn history_drops_oldest_beyond_limit() {
        let mut history = store(&["0", "1", "2"], 3);
        history.push("3");
        assert_eq!(history.entries, vec!["1", "2", "3"]);
    }

    #[test]
    /// 保存先の親ディレクトリは作られ、次回の起動で読み戻せる。
    fn history_persists_across_sessions() {
        let _lock = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history");
        let mut history = store(&[], 10);
        history.file = Some(path.clone());
        history.push("let a = 1");
        history.push("a");
        history.persist().unwrap();

        env::set_var(HISTORY_ENV, &path);
        let reopened = HistoryStore::open();
        env::remove_var(HISTORY_ENV);

        assert_eq!(reopened.entries, vec!["let a = 1", "a"]);
        assert_eq!(reopened.file, Some(path));
    }

    #[test]
    fn history_write_failure_is_a_history_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let mut history = store(&["1"], 10);
        history.file = Some(blocker.join("history"));
        assert!(matches!(history.persist(), Err(ReplError::History { .. })));
    }

    #[test]
    fn history_file_comes_from_environment_first() {
        let _lock = ENV_LOCK.lock().unwrap();
        env::set_var(HISTORY_ENV, "/tmp/jsrepl_env_test_history");
        let resolved = history_file();
        env::remove_var(HISTORY_ENV);
        assert_eq!(resolved, Some(PathBuf::from("/tmp/jsrepl_env_test_history")));
    }

    #[test]
    fn key_decoding() {
        assert_eq!(
            keys(b"a\t\x1b[A\x1b[D\x01\x05\x7f\r"),
            vec![Key::Char('a'), Key::Tab, Key::Up, Key::Left, Key::Home, Key::End, Key::Backspace, Key::Enter]
        );
        assert_eq!(keys("あ".as_bytes()), vec![Key::Char('あ')]);
        assert_eq!(keys(b"\x03\x04"), vec![Key::CtrlC, Key::CtrlD]);
    }

    #[test]
    /// 途中で切れた制御列や未知の制御文字は無視される。
    fn malformed_input_is_unknown() {
        assert_eq!(keys(b"\x1b"), vec![Key::Unknown]);
        assert_eq!(keys(b"\x1bX"), vec![Key::Unknown]);
        assert_eq!(keys(b"\x1b[Z"), vec![Key::Unknown]);
        assert_eq!(keys(b"\x02"), vec![Key::Unknown]);
        assert_eq!(keys(&[0xe3, 0x81]), vec![Key::Unknown]);
    }

    #[test]
    fn repaint_moves_cursor_back() {
        let mut out: Vec<u8> = Vec::new();
        repaint(&mut out, "> ", "\x1b[35mabc\x1b[0m", 2).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "\r> \x1b[35mabc\x1b[0m\x1b[K\x1b[2D");
    }

    #[test]
    /// 履歴をたどって戻ると、たどる前の入力が復元される。
    fn browsing_history_restores_draft() {
        let history = store(&["first", "second"], 10);
        let mut edit = typed(&history, "tmp");
        assert!(edit.apply(Key::Up));
        assert_eq!(edit.text, "second");
        assert!(edit.apply(Key::Up));
        assert!(!edit.apply(Key::Up));
        assert_eq!(edit.text, "first");
        assert!(edit.apply(Key::Down));
        assert!(edit.apply(Key::Down));
        assert_eq!(edit.text, "tmp");
        assert!(!edit.apply(Key::Down));
    }

    #[test]
    /// カーソルはバイト位置で、多バイト文字を 1 歩で越える。
    fn cursor_moves_over_multibyte_characters() {
        let history = store(&[], 10);
        let mut edit = typed(&history, "é.a");
        assert_eq!(edit.cursor, 4);
        edit.apply(Key::Left);
        edit.apply(Key::Left);
        assert_eq!(edit.cursor, 2);
        assert_eq!(edit.chars_after_cursor(), 2);
        assert!(edit.apply(Key::Home));
        assert!(!edit.apply(Key::Left));
        assert!(edit.apply(Key::Right));
        assert!(edit.apply(Key::Backspace));
        assert_eq!(edit.text, ".a");
    }

    #[test]
    fn single_candidate_is_inserted() {
        let history = store(&[], 10);
        let mut edit = typed(&history, "obj.fo");
        assert_eq!(edit.complete_with(&[candidate("fooBar", 2)]), Completion::Extended);
        assert_eq!(edit.text, "obj.fooBar");
        assert_eq!(edit.complete_with(&[candidate("fooBar", 6)]), Completion::None);
    }

    #[test]
    /// 複数候補は共通部分まで伸ばし、伸ばせなければ一覧にする。
    fn multiple_candidates_extend_then_list() {
        let history = store(&[], 10);
        let mut edit = typed(&history, "obj.f");
        let candidates = [candidate("fooA", 1), candidate("fooB", 1)];
        assert_eq!(edit.complete_with(&candidates), Completion::Extended);
        assert_eq!(edit.text, "obj.foo");

        let candidates = [candidate("fooA", 3), candidate("fooB", 3)];
        assert_eq!(
            edit.complete_with(&candidates),
            Completion::Ambiguous(vec!["fooA".into(), "fooB".into()])
        );
        assert_eq!(edit.complete_with(&[]), Completion::None);
    }
}
