use std::io::{self, BufRead};

/// Построчный источник с буфером просмотра вперёд на одну строку.
///
/// Заменяет seek/rewind: граница заголовок/данные определяется через
/// [`LineSource::peek`], и первая строка данных никогда не теряется.
pub struct LineSource<R: BufRead> {
    reader: R,
    lookahead: Option<String>,
    buf: Vec<u8>,
    consumed: usize,
    eof: bool,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            lookahead: None,
            buf: Vec::with_capacity(256),
            consumed: 0,
            eof: false,
        }
    }

    /// Следующая строка без её потребления.
    pub fn peek(&mut self) -> io::Result<Option<&str>> {
        if self.lookahead.is_none() {
            self.lookahead = self.read_raw()?;
        }

        Ok(self.lookahead.as_deref())
    }

    /// Потребляет и возвращает следующую строку (без `\n` / `\r\n`).
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        let line = match self.lookahead.take() {
            Some(l) => Some(l),
            None => self.read_raw()?,
        };

        if line.is_some() {
            self.consumed += 1;
        }

        Ok(line)
    }

    /// Номер последней потреблённой строки (с 1).
    pub fn line_number(&self) -> usize {
        self.consumed
    }

    fn read_raw(&mut self) -> io::Result<Option<String>> {
        if self.eof {
            return Ok(None);
        }

        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf)?;

        if n == 0 {
            self.eof = true;
            return Ok(None);
        }

        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }

        // Архивные файлы — ASCII; битые байты не должны ронять весь файл
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_peek_does_not_consume() {
        let mut src = LineSource::new(Cursor::new("a\r\nb\n\nc"));

        assert_eq!(src.peek().unwrap(), Some("a"));
        assert_eq!(src.peek().unwrap(), Some("a"));
        assert_eq!(src.line_number(), 0);

        assert_eq!(src.next_line().unwrap().as_deref(), Some("a"));
        assert_eq!(src.next_line().unwrap().as_deref(), Some("b"));
        assert_eq!(src.next_line().unwrap().as_deref(), Some(""));
        assert_eq!(src.peek().unwrap(), Some("c"));
        assert_eq!(src.next_line().unwrap().as_deref(), Some("c"));
        assert_eq!(src.line_number(), 4);

        assert_eq!(src.peek().unwrap(), None);
        assert_eq!(src.next_line().unwrap(), None);
    }

    #[test]
    fn test_iterator() {
        let src = LineSource::new(Cursor::new("1 2\n3 4\n"));
        let lines: Vec<String> = src.map(|l| l.unwrap()).collect();

        assert_eq!(lines, vec!["1 2", "3 4"]);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut src = LineSource::new(Cursor::new(b"1.0 \xff\n".to_vec()));
        let line = src.next_line().unwrap().unwrap();

        assert!(line.starts_with("1.0 "));
    }
}
