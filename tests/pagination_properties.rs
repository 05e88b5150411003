use epub_pager::{
    format_chunk, paginate, InMemorySpine, LayoutHeight, LayoutMeasurer, MeasureError, Page,
    Pager, PagerOptions, RunConfig, StyledChunk,
};
use epub_pager_render::{MetricsMeasurer, TextMetrics};

const WIDTH: i32 = 580;
const HEIGHT: i32 = 820;

/// Never overflows.
struct Infinite;

impl LayoutMeasurer for Infinite {
    fn measure(&mut self, _: &str, _: i32, _: LayoutHeight) -> Result<usize, MeasureError> {
        Ok(1)
    }
}

/// Fits at most `budget` bytes of markup per page.
struct ByteBudget {
    budget: usize,
}

impl LayoutMeasurer for ByteBudget {
    fn measure(&mut self, markup: &str, _: i32, height: LayoutHeight) -> Result<usize, MeasureError> {
        let lines = markup.len().max(1);
        Ok(match height {
            LayoutHeight::Unbounded => lines,
            LayoutHeight::Bounded(_) => lines.min(self.budget),
        })
    }
}

fn reference() -> MetricsMeasurer {
    MetricsMeasurer::new(TextMetrics::new(9.0, 22.0))
}

fn novel_chapter(seed: usize, paragraphs: usize) -> Vec<StyledChunk> {
    let mut chunks = vec![StyledChunk::header(format!("Chapter {}", seed + 1))];
    for p in 0..paragraphs {
        let words = 12 + (p * 7 + seed) % 40;
        let body: String = (0..words)
            .map(|w| ["the ", "lantern ", "swung ", "over ", "a ", "harbour ", "quietly "][(w + p) % 7])
            .collect();
        chunks.push(match p % 5 {
            0 => StyledChunk::italic(body),
            3 => StyledChunk::bold(body),
            4 => StyledChunk::other("sup", "*"),
            _ => StyledChunk::normal(body),
        });
        chunks.push(StyledChunk::normal("\n"));
    }
    chunks
}

fn concat(pages: &[Page]) -> String {
    pages.iter().map(Page::markup).collect()
}

fn fragments(chunks: &[StyledChunk]) -> Vec<String> {
    chunks.iter().filter_map(format_chunk).collect()
}

#[test]
fn scenario_infinite_page_keeps_everything_together() {
    let chunks = [
        StyledChunk::normal("Hello "),
        StyledChunk::bold("world"),
        StyledChunk::normal(". "),
    ];
    let pages = paginate(&chunks, WIDTH, HEIGHT, Infinite).expect("paginate");
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].markup(), "Hello <b>world</b>. ");
}

#[test]
fn scenario_second_fragment_forces_break() {
    let a = "A".repeat(500);
    let b = "B".repeat(500);
    let chunks = [StyledChunk::normal(a.clone()), StyledChunk::normal(b.clone())];
    let pages = paginate(&chunks, WIDTH, HEIGHT, ByteBudget { budget: 600 }).expect("paginate");
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].markup(), a);
    assert_eq!(pages[1].markup(), b);
}

#[test]
fn scenario_unrecognized_chunk_leaves_no_gap() {
    let chunks = [
        StyledChunk::normal("left"),
        StyledChunk::other("aside", "dropped"),
        StyledChunk::normal("right"),
    ];
    let pages = paginate(&chunks, WIDTH, HEIGHT, Infinite).expect("paginate");
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].markup(), "leftright");
}

#[test]
fn pages_cover_every_fragment_exactly_once() {
    let chunks = novel_chapter(0, 160);
    let pages = paginate(&chunks, WIDTH, HEIGHT, reference()).expect("paginate");
    assert!(pages.len() > 2, "expected several pages, got {}", pages.len());
    assert_eq!(concat(&pages), fragments(&chunks).concat());
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.chapter_page_index, i);
        assert!(!page.markup().is_empty());
    }
}

#[test]
fn every_break_is_forced_by_the_next_fragment() {
    let chunks = novel_chapter(3, 120);
    let mut m = reference();
    let pages = paginate(&chunks, WIDTH, HEIGHT, &mut m).expect("paginate");
    let frags = fragments(&chunks);

    let mut cursor = 0usize;
    for (k, page) in pages.iter().enumerate() {
        let mut consumed = String::new();
        let first_fragment = frags[cursor].clone();
        while consumed.len() < page.markup().len() {
            consumed.push_str(&frags[cursor]);
            cursor += 1;
        }
        assert_eq!(consumed, page.markup(), "page {} boundary", k);

        let unbounded = m.measure(page.markup(), WIDTH, LayoutHeight::Unbounded).expect("measure");
        let bounded = m
            .measure(page.markup(), WIDTH, LayoutHeight::Bounded(HEIGHT))
            .expect("measure");
        assert!(bounded <= unbounded);

        if k > 0 {
            let previous = pages[k - 1].markup();
            let trial = format!("{}{}", previous, first_fragment);
            let unbounded = m.measure(&trial, WIDTH, LayoutHeight::Unbounded).expect("measure");
            let bounded = m.measure(&trial, WIDTH, LayoutHeight::Bounded(HEIGHT)).expect("measure");
            assert!(bounded < unbounded, "break before page {} was not forced", k);
        }
    }
    assert_eq!(cursor, frags.len());
}

#[test]
fn oversized_fragment_becomes_its_own_verbatim_page() {
    let giant = "word ".repeat(4000);
    let chunks = [
        StyledChunk::normal("before"),
        StyledChunk::italic(giant.clone()),
        StyledChunk::normal("after"),
    ];
    let pages = paginate(&chunks, WIDTH, HEIGHT, reference()).expect("paginate");
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[0].markup(), "before");
    assert_eq!(pages[1].markup(), format!("<i>{}</i>", giant));
    assert_eq!(pages[2].markup(), "after");
}

#[test]
fn chapters_never_share_pages() {
    let chapters = vec![novel_chapter(0, 30), Vec::new(), novel_chapter(1, 5), novel_chapter(2, 60)];
    let pager = Pager::new(PagerOptions::default());
    let mut spine = InMemorySpine::from_chunk_lists(chapters.clone());
    let doc = pager
        .load_document(&mut spine, &mut reference(), RunConfig::default())
        .expect("load");

    let store = doc.pages();
    assert_eq!(store.chapters().len(), chapters.len());
    for (chapter_index, chunks) in chapters.iter().enumerate() {
        let range = store
            .chapter_page_range(chapter_index)
            .expect("chapter recorded");
        let pages: Vec<Page> = range.clone().map(|i| doc.page(i).expect("page").clone()).collect();
        assert!(pages.iter().all(|p| p.chapter_index == chapter_index));
        assert_eq!(concat(&pages), fragments(chunks).concat());
        if chunks.is_empty() {
            assert!(range.is_empty());
        }
    }
    assert_eq!(
        store.iter().count(),
        store.chapters().iter().map(|c| c.page_count).sum::<usize>()
    );
}

#[test]
fn empty_chapter_yields_no_pages() {
    let chunks: Vec<StyledChunk> = Vec::new();
    assert!(paginate(&chunks, WIDTH, HEIGHT, reference()).expect("paginate").is_empty());

    let only_dropped = [StyledChunk::other("img", "")];
    assert!(paginate(&only_dropped, WIDTH, HEIGHT, reference())
        .expect("paginate")
        .is_empty());
}

#[test]
fn reference_measurer_errors_abort_the_chapter() {
    let chunks = [StyledChunk::normal("fine"), StyledChunk::normal("also fine")];
    let mut m = reference();
    // Escaped text never trips the parser; a raw tag would.
    assert!(paginate(&chunks, WIDTH, HEIGHT, &mut m).is_ok());
    assert!(m
        .measure("<blink>x</blink>", WIDTH, LayoutHeight::Unbounded)
        .is_err());
}
