// ============================================================================
// Command scripts: line-based drawing commands for headless runs
// ============================================================================
//
// One command per line, whitespace-separated arguments, `#` starts a comment.
//
//   color 255 0 0            secondary #00ff00        pattern checkerboard
//   pencil 4 10 10 50 50 90 10
//   shape ellipse 10 10 90 60 2
//   fill 5 5
//   layer add                layer opacity 1 0.5
//
// Parsing is done up front, so a malformed script never touches the canvas.

use image::Rgba;

use crate::coords::Point;
use crate::engine::{DrawingEngine, Tool};
use crate::error::{EngineError, Result};
use crate::ops::effects::{ColorPolicy, SparkleOverlay};
use crate::ops::pattern::PatternKind;
use crate::ops::shapes::{ShapeKind, ShapeStyle};

/// One parsed script line.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptCommand {
    Color(Rgba<u8>),
    Secondary(Rgba<u8>),
    Pattern(PatternKind),
    /// `None` switches the rotating hue off.
    Rainbow(Option<f32>),
    /// `None` switches the sparkle overlay off.
    Sparkle(Option<f32>),
    Pencil { size: f32, points: Vec<Point> },
    Eraser { size: f32, points: Vec<Point> },
    Spray { radius: f32, density: u32, points: Vec<Point> },
    Line { width: f32, from: Point, to: Point },
    Shape { kind: ShapeKind, from: Point, to: Point, outline_width: f32 },
    Fill(Point),
    LayerAdd,
    LayerDelete,
    LayerDuplicate,
    LayerMergeDown,
    LayerSelect(usize),
    LayerOpacity(usize, f32),
    LayerVisible(usize, bool),
    LayerMove(usize, usize),
    LayerRename(usize, String),
    Resize(u32, u32),
    SelectRect(Point, Point),
    SelectCircle(Point, f32),
    Copy,
    Cut,
    Paste(Point),
    Undo,
    Redo,
    Clear,
    Flatten,
}

/// What a script run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScriptReport {
    /// Commands executed.
    pub commands: usize,
    /// Commands that changed the canvas or its state.
    pub applied: usize,
}

// ============================================================================
// Parsing
// ============================================================================

fn script_err(line: usize, message: impl Into<String>) -> EngineError {
    EngineError::Script {
        line,
        message: message.into(),
    }
}

struct Args<'a> {
    line: usize,
    verb: &'a str,
    rest: std::slice::Iter<'a, &'a str>,
}

impl<'a> Args<'a> {
    fn next(&mut self, what: &str) -> Result<&'a str> {
        self.rest
            .next()
            .copied()
            .ok_or_else(|| script_err(self.line, format!("{}: missing {}", self.verb, what)))
    }

    fn number<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let tok = self.next(what)?;
        tok.parse::<T>()
            .map_err(|_| script_err(self.line, format!("{}: bad {} '{}'", self.verb, what, tok)))
    }

    fn point(&mut self) -> Result<Point> {
        Ok(Point::new(self.number("x")?, self.number("y")?))
    }

    /// At least one point, then pairs until the line ends.
    fn points(&mut self) -> Result<Vec<Point>> {
        let mut points = vec![self.point()?];
        while self.rest.len() > 0 {
            points.push(self.point()?);
        }
        Ok(points)
    }

    fn color(&mut self) -> Result<Rgba<u8>> {
        let first = self.next("colour")?;
        if let Some(hex) = first.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| script_err(self.line, format!("{}: bad colour '{}'", self.verb, first)));
        }
        let (line, verb) = (self.line, self.verb);
        let channel = |tok: &str| {
            tok.parse::<u8>()
                .map_err(|_| script_err(line, format!("{}: bad channel '{}'", verb, tok)))
        };
        let r = channel(first)?;
        let g = channel(self.next("green")?)?;
        let b = channel(self.next("blue")?)?;
        let a = match self.rest.next() {
            Some(&tok) => channel(tok)?,
            None => 255,
        };
        Ok(Rgba([r, g, b, a]))
    }

    fn toggle(&mut self, what: &str) -> Result<Option<f32>> {
        let tok = self.next(what)?;
        if tok.eq_ignore_ascii_case("off") {
            return Ok(None);
        }
        tok.parse::<f32>()
            .map(Some)
            .map_err(|_| script_err(self.line, format!("{}: bad {} '{}'", self.verb, what, tok)))
    }

    fn finish(mut self) -> Result<()> {
        match self.rest.next() {
            Some(extra) => Err(script_err(self.line, format!("{}: unexpected argument '{}'", self.verb, extra))),
            None => Ok(()),
        }
    }
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    let byte = |i: usize| hex.get(i..i + 2).and_then(|s| u8::from_str_radix(s, 16).ok());
    match hex.len() {
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

fn parse_bool(line: usize, tok: &str) -> Result<bool> {
    match tok.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(script_err(line, format!("bad boolean '{}'", tok))),
    }
}

fn parse_layer(args: &mut Args<'_>, line: usize) -> Result<ScriptCommand> {
    let sub = args.next("layer command")?;
    let cmd = match sub {
        "add" => ScriptCommand::LayerAdd,
        "delete" => ScriptCommand::LayerDelete,
        "duplicate" => ScriptCommand::LayerDuplicate,
        "merge-down" => ScriptCommand::LayerMergeDown,
        "select" => ScriptCommand::LayerSelect(args.number("index")?),
        "opacity" => ScriptCommand::LayerOpacity(args.number("index")?, args.number("opacity")?),
        "visible" => {
            let index = args.number("index")?;
            ScriptCommand::LayerVisible(index, parse_bool(line, args.next("visibility")?)?)
        }
        "move" => ScriptCommand::LayerMove(args.number("from")?, args.number("to")?),
        "rename" => {
            let index = args.number("index")?;
            let mut parts = Vec::new();
            while let Some(p) = args.rest.next() {
                parts.push(*p);
            }
            if parts.is_empty() {
                return Err(script_err(line, "layer rename: missing name"));
            }
            ScriptCommand::LayerRename(index, parts.join(" "))
        }
        other => return Err(script_err(line, format!("unknown layer command '{}'", other))),
    };
    Ok(cmd)
}

/// Parse one line.  `Ok(None)` for blank and comment lines.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<ScriptCommand>> {
    let content = strip_comment(line);
    if content.is_empty() {
        return Ok(None);
    }
    let tokens: Vec<&str> = content.split_whitespace().collect();
    let Some((&verb, rest)) = tokens.split_first() else {
        return Ok(None);
    };
    let mut args = Args {
        line: line_no,
        verb,
        rest: rest.iter(),
    };

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "color" | "colour" => ScriptCommand::Color(args.color()?),
        "secondary" => ScriptCommand::Secondary(args.color()?),
        "pattern" => {
            let name = args.next("pattern name")?;
            let kind = PatternKind::from_name(name)
                .ok_or_else(|| script_err(line_no, format!("unknown pattern '{}'", name)))?;
            ScriptCommand::Pattern(kind)
        }
        "rainbow" => ScriptCommand::Rainbow(args.toggle("step")?),
        "sparkle" => ScriptCommand::Sparkle(args.toggle("density")?),
        "pencil" => ScriptCommand::Pencil {
            size: args.number("size")?,
            points: args.points()?,
        },
        "eraser" => ScriptCommand::Eraser {
            size: args.number("size")?,
            points: args.points()?,
        },
        "spray" => ScriptCommand::Spray {
            radius: args.number("radius")?,
            density: args.number("density")?,
            points: args.points()?,
        },
        "line" => ScriptCommand::Line {
            width: args.number("width")?,
            from: args.point()?,
            to: args.point()?,
        },
        "shape" => {
            let name = args.next("shape kind")?;
            let kind = ShapeKind::from_name(name)
                .ok_or_else(|| script_err(line_no, format!("unknown shape '{}'", name)))?;
            let from = args.point()?;
            let to = args.point()?;
            let outline_width = match args.rest.next() {
                Some(tok) => tok
                    .parse()
                    .map_err(|_| script_err(line_no, format!("shape: bad outline width '{}'", tok)))?,
                None => 1.0,
            };
            ScriptCommand::Shape { kind, from, to, outline_width }
        }
        "fill" => ScriptCommand::Fill(args.point()?),
        "layer" => parse_layer(&mut args, line_no)?,
        "resize" => ScriptCommand::Resize(args.number("width")?, args.number("height")?),
        "select-rect" => ScriptCommand::SelectRect(args.point()?, args.point()?),
        "select-circle" => ScriptCommand::SelectCircle(args.point()?, args.number("radius")?),
        "copy" => ScriptCommand::Copy,
        "cut" => ScriptCommand::Cut,
        "paste" => ScriptCommand::Paste(args.point()?),
        "undo" => ScriptCommand::Undo,
        "redo" => ScriptCommand::Redo,
        "clear" => ScriptCommand::Clear,
        "flatten" => ScriptCommand::Flatten,
        other => return Err(script_err(line_no, format!("unknown command '{}'", other))),
    };
    args.finish()?;
    Ok(Some(cmd))
}

/// Drop a trailing ` # comment` while keeping `#rrggbb` tokens.
fn strip_comment(line: &str) -> &str {
    let mut end = line.len();
    let bytes = line.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'#' {
            let token_start = i == 0 || bytes[i - 1].is_ascii_whitespace();
            let next_is_hex = bytes.get(i + 1).is_some_and(|c| c.is_ascii_hexdigit());
            if token_start && !next_is_hex {
                end = i;
                break;
            }
        }
    }
    line[..end].trim()
}

/// Parse a whole script.  Returns commands tagged with their 1-based line.
pub fn parse_script(source: &str) -> Result<Vec<(usize, ScriptCommand)>> {
    let mut commands = Vec::new();
    for (i, line) in source.lines().enumerate() {
        if let Some(cmd) = parse_line(i + 1, line)? {
            commands.push((i + 1, cmd));
        }
    }
    Ok(commands)
}

// ============================================================================
// Execution
// ============================================================================

/// Stroke through `points` with `tool`, then put the previous tool back.
fn stroke(engine: &mut DrawingEngine, tool: Tool, points: &[Point]) -> Result<bool> {
    let previous = engine.state().tool;
    engine.set_tool(tool);
    let result = stroke_points(engine, points);
    engine.set_tool(previous);
    result
}

fn stroke_points(engine: &mut DrawingEngine, points: &[Point]) -> Result<bool> {
    let mut applied = false;
    if let [only] = points {
        applied |= engine.stroke_segment(*only, *only)?;
    }
    for pair in points.windows(2) {
        applied |= engine.stroke_segment(pair[0], pair[1])?;
    }
    Ok(applied)
}

/// Run one command against the engine.
pub fn apply(engine: &mut DrawingEngine, cmd: &ScriptCommand) -> Result<bool> {
    match cmd {
        ScriptCommand::Color(c) => {
            engine.set_primary_color(*c);
            Ok(true)
        }
        ScriptCommand::Secondary(c) => {
            engine.set_secondary_color(*c);
            Ok(true)
        }
        ScriptCommand::Pattern(kind) => {
            engine.set_pattern(*kind);
            Ok(true)
        }
        ScriptCommand::Rainbow(step) => {
            engine.set_color_policy(match step {
                Some(step) => ColorPolicy::rainbow(*step),
                None => ColorPolicy::Solid,
            });
            Ok(true)
        }
        ScriptCommand::Sparkle(density) => {
            engine.set_sparkle(density.map(|density| SparkleOverlay {
                density,
                ..Default::default()
            }));
            Ok(true)
        }
        ScriptCommand::Pencil { size, points } => stroke(engine, Tool::Pencil { size: *size }, points),
        ScriptCommand::Eraser { size, points } => stroke(engine, Tool::Eraser { size: *size }, points),
        ScriptCommand::Spray { radius, density, points } => stroke(
            engine,
            Tool::Spray {
                radius: *radius,
                density: *density,
            },
            points,
        ),
        ScriptCommand::Line { width, from, to } => {
            let mut style = engine.current_shape_style();
            style.outline_width = *width;
            engine.draw_shape(ShapeKind::Line, *from, *to, &style)
        }
        ScriptCommand::Shape {
            kind,
            from,
            to,
            outline_width,
        } => {
            let base = engine.current_shape_style();
            let style = ShapeStyle {
                outline_width: *outline_width,
                ..base
            };
            engine.draw_shape(*kind, *from, *to, &style)
        }
        ScriptCommand::Fill(p) => engine.fill_with_state(*p),
        ScriptCommand::LayerAdd => engine.add_layer(),
        ScriptCommand::LayerDelete => engine.delete_layer(),
        ScriptCommand::LayerDuplicate => engine.duplicate_layer(),
        ScriptCommand::LayerMergeDown => engine.merge_down(),
        ScriptCommand::LayerSelect(i) => engine.select_layer(*i),
        ScriptCommand::LayerOpacity(i, o) => engine.set_layer_opacity(*i, *o),
        ScriptCommand::LayerVisible(i, v) => engine.set_layer_visibility(*i, *v),
        ScriptCommand::LayerMove(a, b) => engine.reorder_layer(*a, *b),
        ScriptCommand::LayerRename(i, name) => engine.rename_layer(*i, name),
        ScriptCommand::Resize(w, h) => engine.resize_canvas(*w, *h),
        ScriptCommand::SelectRect(a, b) => Ok(engine.select_rect(*a, *b)),
        ScriptCommand::SelectCircle(c, r) => Ok(engine.select_circle(*c, *r)),
        ScriptCommand::Copy => engine.copy_selection(),
        ScriptCommand::Cut => engine.cut_selection(),
        ScriptCommand::Paste(p) => engine.paste_selection(*p),
        ScriptCommand::Undo => engine.undo(),
        ScriptCommand::Redo => engine.redo(),
        ScriptCommand::Clear => engine.clear_active_layer(crate::canvas::TRANSPARENT),
        ScriptCommand::Flatten => engine.flatten(),
    }
}

/// Parse and run `source`.  Parsing finishes before the first command runs.
pub fn run_script(engine: &mut DrawingEngine, source: &str) -> Result<ScriptReport> {
    let commands = parse_script(source)?;
    let mut report = ScriptReport::default();
    for (line, cmd) in &commands {
        let applied = apply(engine, cmd).map_err(|e| {
            log::error!("script line {}: {}", line, e);
            e
        })?;
        report.commands += 1;
        if applied {
            report.applied += 1;
        } else {
            log::debug!("script line {}: no-op", line);
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_colours() {
        assert_eq!(parse_line(1, "color 1 2 3").unwrap(), Some(ScriptCommand::Color(Rgba([1, 2, 3, 255]))));
        assert_eq!(
            parse_line(1, "secondary #ff000080").unwrap(),
            Some(ScriptCommand::Secondary(Rgba([255, 0, 0, 128])))
        );
        assert_eq!(
            parse_line(1, "color #00ff00 # green").unwrap(),
            Some(ScriptCommand::Color(Rgba([0, 255, 0, 255])))
        );
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse_line(1, "").unwrap(), None);
        assert_eq!(parse_line(2, "   # just a note").unwrap(), None);
        assert_eq!(parse_line(3, "undo # step back").unwrap(), Some(ScriptCommand::Undo));
    }

    #[test]
    fn test_parse_strokes_and_layers() {
        assert_eq!(
            parse_line(1, "pencil 3 0 0 10 10").unwrap(),
            Some(ScriptCommand::Pencil {
                size: 3.0,
                points: vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)],
            })
        );
        assert_eq!(
            parse_line(1, "layer rename 0 Sky and sea").unwrap(),
            Some(ScriptCommand::LayerRename(0, "Sky and sea".to_string()))
        );
        assert_eq!(parse_line(1, "layer visible 1 off").unwrap(), Some(ScriptCommand::LayerVisible(1, false)));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        match parse_script("color 1 2 3\nfrobnicate\n") {
            Err(EngineError::Script { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected script error, got {:?}", other),
        }
        assert!(parse_line(1, "pencil 3 0").is_err());
        assert!(parse_line(1, "undo now").is_err());
        assert!(parse_line(1, "pattern plaid").is_err());
    }

    #[test]
    fn test_run_script_draws() {
        let mut engine = DrawingEngine::new(32, 32).unwrap();
        let report = run_script(&mut engine, "color 255 0 0\nfill 1 1\n").unwrap();
        assert_eq!(report.commands, 2);
        assert_eq!(report.applied, 2);
        let image = engine.render_composite().unwrap();
        assert_eq!(*image.get_pixel(20, 20), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_bad_script_leaves_canvas_alone() {
        let mut engine = DrawingEngine::new(8, 8).unwrap();
        assert!(run_script(&mut engine, "fill 1 1\nnot-a-command").is_err());
        assert_eq!(engine.history().len(), 1);
    }
}
