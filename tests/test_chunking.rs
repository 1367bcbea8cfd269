//! Chunker properties over generated documents

use ragrank::chunking::{chunk_text, Chunk, ChunkOptions, SplitBy};

const WORDS: &[&str] = &[
    "refund", "policy", "office", "hours", "within", "shipping", "invoice", "customer", "returns",
    "the", "days", "support", "account", "billing", "delivery",
];

/// Longest paragraph `generated_document` can produce: 12 eight-letter words,
/// their spaces and a period
const MAX_PARAGRAPH_CHARS: usize = 12 * 8 + 11 + 1;

/// Deterministic paragraphs of 1..=12 words joined by blank lines
fn generated_document(paragraphs: usize, seed: u64) -> String {
    let mut state = seed;
    let mut next = move |bound: u64| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) % bound
    };

    (0..paragraphs)
        .map(|_| {
            let words = 1 + next(12) as usize;
            (0..words)
                .map(|_| WORDS[next(WORDS.len() as u64) as usize])
                .collect::<Vec<_>>()
                .join(" ")
                + "."
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn option_grid() -> Vec<ChunkOptions> {
    let mut grid = Vec::new();
    for max in [120, 200, 512] {
        for min in [1, 50, 100] {
            if min <= max {
                grid.push(ChunkOptions {
                    max_chunk_size: max,
                    min_chunk_size: min,
                    overlap_size: 0,
                    split_by: SplitBy::Paragraph,
                });
            }
        }
    }
    grid
}

fn check_ordering(chunks: &[Chunk]) {
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert!(chunk.start_index < chunk.end_index);
    }
    for pair in chunks.windows(2) {
        assert!(pair[0].start_index <= pair[1].start_index);
    }
}

#[test]
fn test_chunks_respect_max_size() {
    // A buffer still under min_chunk_size keeps absorbing units, so the bound
    // only holds when such a buffer always has room for one more paragraph
    let grid: Vec<ChunkOptions> = option_grid()
        .into_iter()
        .filter(|o| o.min_chunk_size + MAX_PARAGRAPH_CHARS + 1 <= o.max_chunk_size)
        .collect();
    assert!(grid.len() >= 5);

    for seed in 1..20 {
        let text = generated_document(30, seed);
        for options in grid.iter().cloned() {
            let chunks = chunk_text(&text, "doc", "doc.txt", &options).unwrap();
            assert!(!chunks.is_empty());
            check_ordering(&chunks);

            for chunk in &chunks {
                assert!(
                    chunk.len() <= options.max_chunk_size,
                    "seed={} options={:?} len={}",
                    seed,
                    options,
                    chunk.len()
                );
            }
        }
    }
}

#[test]
fn test_chunks_cover_document_without_gaps() {
    for seed in 1..20 {
        let text = generated_document(25, seed);
        for options in option_grid() {
            let chunks = chunk_text(&text, "doc", "doc.txt", &options).unwrap();

            assert!(text[..chunks[0].start_index].trim().is_empty());
            for chunk in &chunks {
                assert_eq!(chunk.text, &text[chunk.start_index..chunk.end_index]);
            }
            for pair in chunks.windows(2) {
                let gap = &text[pair[0].end_index..pair[1].start_index];
                assert!(gap.trim().is_empty(), "seed={} gap={:?}", seed, gap);
            }

            // Only a tail shorter than min_chunk_size may be left out
            let last = chunks[chunks.len() - 1].end_index;
            let tail = text[last..].trim();
            assert!(tail.chars().count() < options.min_chunk_size || tail.is_empty());
        }
    }
}

#[test]
fn test_overlap_reaches_back_into_previous_chunk() {
    let options = ChunkOptions {
        max_chunk_size: 120,
        min_chunk_size: 20,
        overlap_size: 15,
        split_by: SplitBy::Paragraph,
    };

    for seed in 1..10 {
        let text = generated_document(20, seed);
        let chunks = chunk_text(&text, "doc", "doc.txt", &options).unwrap();
        check_ordering(&chunks);

        for pair in chunks.windows(2) {
            assert!(pair[1].start_index < pair[0].end_index);
            let carried = pair[1].text.split_whitespace().next().unwrap();
            assert!(pair[0].text.contains(carried));
        }
    }
}

#[test]
fn test_sentence_mode_offsets_point_into_source() {
    let text = "First sentence here. Second one follows! Is this the third? Trailing words";
    let options = ChunkOptions {
        max_chunk_size: 30,
        min_chunk_size: 5,
        overlap_size: 0,
        split_by: SplitBy::Sentence,
    };

    let chunks = chunk_text(text, "doc", "doc.txt", &options).unwrap();
    check_ordering(&chunks);
    assert!(chunks.len() >= 3);
    for chunk in &chunks {
        assert_eq!(chunk.text, &text[chunk.start_index..chunk.end_index]);
    }
}
