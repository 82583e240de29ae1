use bitfont::codec::{get_codec, Codec, CodecId, DEFAULT_LEVEL};
use bitfont::{load, save, Font, Glyph, LoadOptions, Location, Pack, SaveOptions, Stream};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// A 256-glyph 8x16 font with a checkerboard in every cell.
fn sample_font(name: &str) -> Font {
    let glyphs = (0..256u32)
        .map(|cp| {
            let pixels = (0..16)
                .map(|y| (0..8).map(|x| (x + y + cp as usize) % 2 == 0).collect())
                .collect();
            Glyph::new(pixels).with_codepoint(cp)
        })
        .collect();
    Font::new(glyphs).with_property("name", name)
}

fn yaff_bytes(font: &Font) -> Vec<u8> {
    let sink = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let mut out = Stream::from_writer("bench.yaff", SharedBuf(sink.clone())).unwrap();
    save(&Pack::from(font.clone()), Location::Stream(&mut out), Location::Empty, &SaveOptions::default()).unwrap();
    out.close().unwrap();
    let bytes = sink.borrow().clone();
    bytes
}

struct SharedBuf(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

impl std::io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn bench_yaff(c: &mut Criterion) {
    let font = sample_font("Bench");
    let text = yaff_bytes(&font);

    c.bench_function("yaff_load_256_glyphs", |b| {
        b.iter(|| {
            let mut s = Stream::from_bytes("bench.yaff", black_box(text.clone())).unwrap();
            load(Location::Stream(&mut s), Location::Empty, &LoadOptions::default()).unwrap()
        })
    });

    c.bench_function("yaff_save_256_glyphs", |b| b.iter(|| yaff_bytes(black_box(&font))));
}

fn bench_bundle(c: &mut Criterion) {
    let pack: Pack = (0..8).map(|i| sample_font(&format!("Bench {i}"))).collect();

    c.bench_function("bundle_save_8_fonts", |b| {
        b.iter(|| {
            let mut out = Stream::from_writer("bench.fpk", Vec::new()).unwrap();
            save(black_box(&pack), Location::Stream(&mut out), Location::Empty, &SaveOptions::default()).unwrap();
            out.close().unwrap();
        })
    });
}

fn bench_codec(c: &mut Criterion) {
    let text = yaff_bytes(&sample_font("Bench"));
    let zstd = get_codec(CodecId::Zstd);
    c.bench_function("zstd_compress_yaff", |b| b.iter(|| zstd.compress(black_box(&text), DEFAULT_LEVEL)));
}

criterion_group!(benches, bench_yaff, bench_bundle, bench_codec);
criterion_main!(benches);
