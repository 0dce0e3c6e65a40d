use criterion::{Criterion, black_box, criterion_group, criterion_main};

use textmarker_engine::anchors::{decode_path, encode_path};
use textmarker_engine::dom::markup;
use textmarker_engine::dom::range::find_text;
use textmarker_engine::highlight::Highlight;
use textmarker_engine::marking;

fn wide_document(paragraphs: usize) -> String {
    let mut out = String::from("<article>");
    for index in 0..paragraphs {
        out.push_str(&format!(
            "<p>Paragraph {index} with some <b>bold</b> filler text.</p>"
        ));
    }
    out.push_str("</article>");
    out
}

fn bench_encode_decode(c: &mut Criterion) {
    let tree = markup::parse(&wide_document(200));
    let range = find_text(&tree, "Paragraph 199").unwrap();

    c.bench_function("encode_path", |b| {
        b.iter(|| encode_path(&tree, black_box(range.start.node), tree.root()))
    });

    let path = encode_path(&tree, range.start.node, tree.root());
    c.bench_function("decode_path", |b| {
        b.iter(|| decode_path(&tree, black_box(&path), tree.root()))
    });
}

fn bench_restore_all(c: &mut Criterion) {
    let markup_src = wide_document(50);
    let mut tree = markup::parse(&markup_src);

    let mut highlights = Vec::new();
    for index in 0..50 {
        let needle = format!("Paragraph {index}");
        let range = find_text(&tree, &needle).unwrap();
        let highlight = Highlight::from_selection(&tree, &range, "#ffff00");
        marking::apply(&mut tree, &range, &highlight.color, highlight.id);
        highlights.push(highlight);
    }

    c.bench_function("restore_all_50", |b| {
        b.iter(|| {
            let mut fresh = markup::parse(&markup_src);
            let root = fresh.root();
            marking::restore_all(&mut fresh, root, black_box(&highlights))
        })
    });
}

criterion_group!(benches, bench_encode_decode, bench_restore_all);
criterion_main!(benches);
