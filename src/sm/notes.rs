use crate::events::{InputEvent, OutputEvent, Position};
use crate::sm::timing::ROWS_PER_BEAT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    Tap,
    Hold,
    Roll,
    Mine,
    Fake,
}

#[derive(Debug, Clone)]
pub struct ParsedNote {
    pub row_index: usize,
    pub column: usize,
    pub note_kind: NoteKind,
    pub tail_row_index: Option<usize>,
}

/// Parses minimized chart note data into note events, tracking hold/roll tails.
pub fn parse_chart_notes(minimized_note_data: &[u8], lanes: usize) -> Vec<ParsedNote> {
    let mut notes = Vec::new();
    let mut row_index = 0usize;
    let lanes = lanes.max(1);
    let mut hold_heads: Vec<Option<usize>> = vec![None; lanes];

    for line in minimized_note_data.split(|&b| b == b'\n') {
        let trimmed_line = line.strip_suffix(b"\r").unwrap_or(line);
        if trimmed_line.is_empty() || trimmed_line == b"," {
            continue;
        }

        if trimmed_line.len() >= lanes {
            for (col_index, &ch) in trimmed_line.iter().take(lanes).enumerate() {
                match ch {
                    b'1' => notes.push(ParsedNote {
                        row_index,
                        column: col_index,
                        note_kind: NoteKind::Tap,
                        tail_row_index: None,
                    }),
                    b'F' | b'f' => notes.push(ParsedNote {
                        row_index,
                        column: col_index,
                        note_kind: NoteKind::Fake,
                        tail_row_index: None,
                    }),
                    b'2' | b'4' => {
                        let note_kind = if ch == b'2' {
                            NoteKind::Hold
                        } else {
                            NoteKind::Roll
                        };
                        let note_index = notes.len();
                        notes.push(ParsedNote {
                            row_index,
                            column: col_index,
                            note_kind,
                            tail_row_index: None,
                        });
                        hold_heads[col_index] = Some(note_index);
                    }
                    b'M' | b'm' => notes.push(ParsedNote {
                        row_index,
                        column: col_index,
                        note_kind: NoteKind::Mine,
                        tail_row_index: None,
                    }),
                    b'3' => {
                        if let Some(head_idx) = hold_heads[col_index].take()
                            && let Some(note) = notes.get_mut(head_idx)
                        {
                            note.tail_row_index = Some(row_index);
                        }
                    }
                    _ => {}
                }
            }
        }
        row_index += 1;
    }

    notes
}

fn position_at_row(row: usize) -> Position {
    Position::new(row as f64 / ROWS_PER_BEAT as f64, row as i64)
}

/// Turns parsed note data into the ordered [`InputEvent`] list the core's
/// foot-stepping search consumes. Fake notes carry no judgement in the
/// source format and are dropped rather than forced onto a foot.
pub fn events_from_note_data(minimized_note_data: &[u8], lanes: usize) -> Vec<InputEvent> {
    let notes = parse_chart_notes(minimized_note_data, lanes);
    let mut events = Vec::with_capacity(notes.len() * 2);
    for note in &notes {
        let position = position_at_row(note.row_index);
        match note.note_kind {
            NoteKind::Tap => events.push(InputEvent::LaneTap { position, lane: note.column }),
            NoteKind::Mine => events.push(InputEvent::LaneMine { position, lane: note.column }),
            NoteKind::Fake => {}
            NoteKind::Hold | NoteKind::Roll => {
                let is_roll = matches!(note.note_kind, NoteKind::Roll);
                events.push(InputEvent::LaneHoldStart { position, lane: note.column, is_roll });
                if let Some(tail) = note.tail_row_index {
                    events.push(InputEvent::LaneHoldEnd { position: position_at_row(tail), lane: note.column });
                }
            }
        }
    }
    events.sort_by_key(|e| e.position());
    events
}

/// Renders an ordered [`OutputEvent`] list back into `lanes`-wide minimized
/// note-data text, one row per line, measures separated by a `,` line every
/// four beats.
pub fn render_note_data(events: &[OutputEvent], lanes: usize, total_rows: usize) -> String {
    let rows_per_measure = ROWS_PER_BEAT as usize * 4;
    let total_rows = total_rows.max(rows_per_measure);
    let mut grid = vec![vec![b'0'; lanes]; total_rows];
    let mut hold_tails: Vec<(usize, usize, u8)> = Vec::new();

    for event in events {
        let row = event.position().row as usize;
        if row >= grid.len() {
            continue;
        }
        match event {
            OutputEvent::LaneTap { lane, .. } => grid[row][*lane] = b'1',
            OutputEvent::LaneFake { lane, .. } => grid[row][*lane] = b'F',
            OutputEvent::LaneMine { lane, .. } => grid[row][*lane] = b'M',
            OutputEvent::LaneLift { lane, .. } => grid[row][*lane] = b'1',
            OutputEvent::LaneHoldStart { lane, is_roll, .. } => {
                grid[row][*lane] = if *is_roll { b'4' } else { b'2' };
            }
            OutputEvent::LaneHoldEnd { lane, .. } => hold_tails.push((row, *lane, b'3')),
            OutputEvent::Passthrough { .. } => {}
        }
    }
    for (row, lane, marker) in hold_tails {
        grid[row][lane] = marker;
    }

    let mut out = String::with_capacity(total_rows * (lanes + 1));
    for (row_index, row) in grid.iter().enumerate() {
        if row_index > 0 && row_index % rows_per_measure == 0 {
            out.push_str(",\n");
        }
        out.push_str(std::str::from_utf8(row).unwrap());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_from_note_data_pairs_hold_tail() {
        let data = b"1000\n0000\n0000\n2000\n0000\n3000\n";
        let events = events_from_note_data(data, 4);
        let starts = events.iter().filter(|e| matches!(e, InputEvent::LaneHoldStart { .. })).count();
        let ends = events.iter().filter(|e| matches!(e, InputEvent::LaneHoldEnd { .. })).count();
        assert_eq!(starts, 1);
        assert_eq!(ends, 1);
    }

    #[test]
    fn render_note_data_round_trips_a_tap() {
        let events = vec![OutputEvent::LaneTap { position: position_at_row(0), lane: 2 }];
        let rendered = render_note_data(&events, 4, 1);
        assert!(rendered.starts_with("0010\n"));
    }
}
