// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Cross-subsystem scenarios: plane tree → compositor → diff renderer, and
//! decoder stream properties that span multiple events.

use pretty_assertions::assert_eq;
use r3bl_termcore::{
    Cell, CellBuffer, Color, ColorDepth, Decoder, Event, KeyCode, PlaneTree, Pos, Rect,
    Renderer, Size, Style,
};

fn flush_to_vec(renderer: &mut Renderer) -> Vec<u8> {
    let mut out = Vec::new();
    renderer.flush(&mut out).expect("Vec writes are infallible");
    out
}

/// Compose the tree into the renderer's back buffer, then flush.
fn compose_and_flush(tree: &mut PlaneTree, renderer: &mut Renderer) -> Vec<u8> {
    let _ = tree.compose(renderer.back_mut());
    flush_to_vec(renderer)
}

#[test]
fn overlay_composites_and_renders_through() {
    let size = Size::new(10, 1);
    let mut tree = PlaneTree::new(size);
    let mut renderer = Renderer::new(size, ColorDepth::TrueColor);

    let root = tree.root();
    tree.buffer_mut(root)
        .expect("root")
        .print(Pos::new(0, 0), "BACKGROUND", Style::default());
    let overlay = tree
        .create_plane(root, Rect::new(0, 0, 10, 1))
        .expect("create");
    let overlay_buf = tree.buffer_mut(overlay).expect("overlay");
    for col in [0u16, 2, 4] {
        overlay_buf.set_cell(col, 0, Cell::new('X', Style::default()));
    }

    let out = compose_and_flush(&mut tree, &mut renderer);
    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("XAXKXROUND"), "{text:?}");

    // Steady state: nothing dirty, nothing emitted.
    let out = compose_and_flush(&mut tree, &mut renderer);
    assert_eq!(out, b"");
}

#[test]
fn hiding_an_overlay_repaints_only_its_region() {
    let size = Size::new(20, 2);
    let mut tree = PlaneTree::new(size);
    let mut renderer = Renderer::new(size, ColorDepth::TrueColor);

    let root = tree.root();
    tree.buffer_mut(root)
        .expect("root")
        .print(Pos::new(0, 0), "aaaaaaaaaaaaaaaaaaaa", Style::default());
    tree.buffer_mut(root)
        .expect("root")
        .print(Pos::new(0, 1), "bbbbbbbbbbbbbbbbbbbb", Style::default());
    let overlay = tree
        .create_plane(root, Rect::new(2, 0, 4, 1))
        .expect("create");
    tree.buffer_mut(overlay)
        .expect("overlay")
        .print(Pos::new(0, 0), "####", Style::default());

    let first = compose_and_flush(&mut tree, &mut renderer);
    assert!(String::from_utf8_lossy(&first).contains("####"));

    tree.set_visible(overlay, false);
    let second = compose_and_flush(&mut tree, &mut renderer);
    let text = String::from_utf8_lossy(&second);
    // The covered cells reappear; row 1 was untouched so no 'b' re-emits.
    assert!(text.contains("aaaa"), "{text:?}");
    assert!(!text.contains('b'), "{text:?}");
    assert!(second.len() < first.len(), "partial repaint expected");
}

#[test]
fn wide_chars_survive_the_full_pipeline() {
    let size = Size::new(6, 1);
    let mut tree = PlaneTree::new(size);
    let mut renderer = Renderer::new(size, ColorDepth::TrueColor);

    let root = tree.root();
    tree.buffer_mut(root)
        .expect("root")
        .print(Pos::new(0, 0), "a中b", Style::default());
    let out = compose_and_flush(&mut tree, &mut renderer);
    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("a中b"), "{text:?}");

    // Overlay a narrow cell onto the continuation column; the wide base must
    // not survive as an orphan anywhere downstream.
    let overlay = tree
        .create_plane(root, Rect::new(2, 0, 1, 1))
        .expect("create");
    tree.buffer_mut(overlay)
        .expect("overlay")
        .set_cell(0, 0, Cell::new('!', Style::default()));
    let _ = tree.compose(renderer.back_mut());

    assert_eq!(renderer.back().get_cell(1, 0).ch, ' ');
    assert_eq!(renderer.back().get_cell(2, 0).ch, '!');
    let out = flush_to_vec(&mut renderer);
    let text = String::from_utf8_lossy(&out);
    assert!(text.contains('!'), "{text:?}");
    assert!(!text.contains('中'), "{text:?}");
}

#[test]
fn resize_recomposes_and_redraws_everything() {
    let size = Size::new(8, 2);
    let mut tree = PlaneTree::new(size);
    let mut renderer = Renderer::new(size, ColorDepth::TrueColor);

    let root = tree.root();
    tree.buffer_mut(root)
        .expect("root")
        .print(Pos::new(0, 0), "hello", Style::default());
    let _ = compose_and_flush(&mut tree, &mut renderer);

    // Simulate the facade's resize wiring.
    let new_size = Size::new(12, 3);
    tree.set_target_size(new_size);
    renderer.resize(new_size);
    tree.buffer_mut(root)
        .expect("root")
        .print(Pos::new(0, 0), "hello", Style::default());

    let out = compose_and_flush(&mut tree, &mut renderer);
    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("hello"), "{text:?}");
}

#[test]
fn print_iteration_round_trips_text() {
    // Buffer print followed by iteration yields the input, up to the
    // combiner cap and wide-edge clipping.
    let mut buffer = CellBuffer::new(Size::new(16, 1));
    let input = "héllo wörld";
    buffer.print(Pos::new(0, 0), input, Style::default());
    assert_eq!(buffer.row_text(0), input);
}

#[test]
fn decoder_preserves_byte_order_across_event_kinds() {
    let mut decoder = Decoder::new();
    let stream = b"a\x1b[A\x1b[<0;3;4Mb\x1b[200~p\x1b[201~c";
    let mut kinds = Vec::new();
    for &byte in stream.iter() {
        if let Some(event) = decoder.feed(byte).expect("no overflow") {
            kinds.push(match event {
                Event::Key(k) => format!("key:{:?}", k.code),
                Event::Mouse(m) => format!("mouse:{:?}", m.pos),
                Event::Paste(p) => format!("paste:{}", String::from_utf8_lossy(p)),
                Event::Focus(f) => format!("focus:{f}"),
                Event::Resize(_) => "resize".into(),
            });
        }
    }
    assert_eq!(kinds, vec![
        "key:Char('a')".to_string(),
        format!("key:{:?}", KeyCode::Up),
        format!("mouse:{:?}", Pos::new(2, 3)),
        "key:Char('b')".to_string(),
        "paste:p".to_string(),
        "key:Char('c')".to_string(),
    ]);
}

#[test]
fn mono_depth_strips_color_but_keeps_the_luminance_split() {
    let size = Size::new(4, 1);
    let mut renderer = Renderer::new(size, ColorDepth::Mono);
    // A bright and a dark foreground must downgrade differently: the bright
    // one draws with the default foreground, the dark one collapses to black.
    let bright = Style {
        fg: Color::Rgb(230, 230, 230),
        bg: Color::Indexed(33),
        ..Style::default()
    };
    let dark = Style {
        fg: Color::Rgb(20, 20, 20),
        ..Style::default()
    };
    renderer.back_mut().print(Pos::new(0, 0), "x", bright);
    renderer.back_mut().print(Pos::new(1, 0), "y", dark);
    let mut out = Vec::new();
    renderer.flush(&mut out).expect("vec write");
    let text = String::from_utf8_lossy(&out);
    // No indexed/rgb/basic-hue sequences survive mono.
    assert!(!text.contains("38;"), "{text:?}");
    assert!(!text.contains("48;"), "{text:?}");
    assert!(!text.contains("[31m"), "{text:?}");
    // The dark cell is the only one that switches the foreground (to black).
    assert!(text.contains("\x1b[30m"), "{text:?}");
}
