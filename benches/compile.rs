//! Benchmarks for manuscript compilation.
//!
//! Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use jugaadpress::export::{Format, compile};
use jugaadpress::markdown::{LinkStyle, LinkTargets, render_markdown, rewrite_links};
use jugaadpress::Manuscript;

/// A book of `pages` chapters, each linking to the next.
fn sample_book(pages: usize) -> Manuscript {
    let mut book = Manuscript::new("Benchmark Notes");
    for i in 0..pages {
        let next = (i + 1) % pages;
        let content = format!(
            "# Chapter {i}\n\n\
             Some *emphasis*, some **strong** text and `inline code`.\n\n\
             - first item\n- second item\n- third item\n\n\
             | a | b |\n|---|---|\n| 1 | 2 |\n\n\
             ```rust\nfn main() {{ println!(\"{i}\"); }}\n```\n\n\
             Continue in [chapter {next}](./{next:03}_chapter.md).\n"
        );
        book.add_page(format!("{i:03}_chapter.md"), content.repeat(4));
    }
    book.sort_pages();
    book
}

fn bench_render(c: &mut Criterion) {
    let book = sample_book(1);
    let content = &book.pages[0].content;
    c.bench_function("render_markdown", |b| {
        b.iter(|| render_markdown(black_box(content)))
    });

    let html = render_markdown(content);
    let targets = LinkTargets::new(["000_chapter.md", "001_chapter.md"]);
    c.bench_function("rewrite_links", |b| {
        b.iter(|| rewrite_links(black_box(&html), &targets, LinkStyle::Xhtml))
    });
}

fn bench_compile(c: &mut Criterion) {
    let book = sample_book(50);

    let mut group = c.benchmark_group("compile");
    for format in [Format::Html, Format::Epub, Format::Pdf] {
        group.bench_function(format.extension(), |b| {
            b.iter(|| compile(black_box(&book), format).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_render, bench_compile);
criterion_main!(benches);
