// ============================================================
// Layer 4 — ELECTRA Example Builder
// ============================================================
// Packs the tokenized lines of a document into pretraining
// examples of the form
//
//   [CLS] segment A [SEP]
//   [CLS] segment A [SEP] segment B [SEP]
//
// Lines are accumulated until their total length reaches the
// current target length, then split into two segments:
//   - segment A aims for (target - 3) / 2 tokens, or for the
//     whole target in 10% of examples
//   - a line goes to A if A is empty, if it fits under the aim,
//     or (while B is still empty and A is under its aim) on a
//     fair coin flip
//   - both segments are trimmed so the example fits max_length
// 5% of the time the next target length is drawn uniformly
// from [5, max_length] to expose the model to short inputs.
//
// Examples never cross a document boundary: leftovers are
// flushed when the document ends.
//
// Reference: Clark et al. (2020) ELECTRA, build_pretraining_dataset

use rand::Rng;

use crate::domain::special_tokens::SpecialTokens;

const SINGLE_SEGMENT_PROB: f64 = 0.1;
const SHORT_TARGET_PROB:   f64 = 0.05;
const MIN_TARGET_LEN:      usize = 5;

pub struct ExampleBuilder {
    max_length:        usize,
    cls_id:            u32,
    sep_id:            u32,
    target_length:     usize,
    current_sentences: Vec<Vec<u32>>,
    current_length:    usize,
}

impl ExampleBuilder {
    /// # Panics
    /// Panics if `max_length` cannot hold [CLS] x [SEP]
    pub fn new(max_length: usize, special: &SpecialTokens) -> Self {
        assert!(max_length >= MIN_TARGET_LEN, "max_length ({max_length}) must be at least {MIN_TARGET_LEN}");
        Self {
            max_length,
            cls_id:            special.cls,
            sep_id:            special.sep,
            target_length:     max_length,
            current_sentences: Vec::new(),
            current_length:    0,
        }
    }

    /// Feed one tokenized line; returns an example when enough
    /// tokens have accumulated.
    pub fn add_line<R: Rng + ?Sized>(&mut self, token_ids: Vec<u32>, rng: &mut R) -> Option<Vec<u32>> {
        if token_ids.is_empty() {
            return None;
        }
        self.current_length += token_ids.len();
        self.current_sentences.push(token_ids);
        if self.current_length >= self.target_length {
            Some(self.create_example(rng))
        } else {
            None
        }
    }

    /// Document boundary: emit whatever is pending.
    pub fn flush<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Vec<u32>> {
        if self.current_length == 0 {
            return None;
        }
        Some(self.create_example(rng))
    }

    /// Build every example of one document.
    pub fn build_document<R: Rng + ?Sized>(&mut self, lines: Vec<Vec<u32>>, rng: &mut R) -> Vec<Vec<u32>> {
        let mut examples: Vec<Vec<u32>> = lines
            .into_iter()
            .filter_map(|line| self.add_line(line, rng))
            .collect();
        examples.extend(self.flush(rng));
        examples
    }

    fn create_example<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<u32> {
        let first_target = if rng.gen::<f64>() < SINGLE_SEGMENT_PROB {
            self.target_length
        } else {
            self.target_length.saturating_sub(3) / 2
        };

        let mut first:  Vec<u32> = Vec::new();
        let mut second: Vec<u32> = Vec::new();
        for sentence in self.current_sentences.drain(..) {
            let goes_first = first.is_empty()
                || first.len() + sentence.len() < first_target
                || (second.is_empty() && first.len() < first_target && rng.gen::<f64>() < 0.5);
            if goes_first {
                first.extend(sentence);
            } else {
                second.extend(sentence);
            }
        }

        // trim while leaving room for [CLS] and the [SEP]s
        first.truncate(self.max_length - 2);
        second.truncate(self.max_length.saturating_sub(first.len() + 3));

        self.current_length = 0;
        self.target_length = if rng.gen::<f64>() < SHORT_TARGET_PROB {
            rng.gen_range(MIN_TARGET_LEN..=self.max_length)
        } else {
            self.max_length
        };

        self.make_example(first, second)
    }

    fn make_example(&self, first: Vec<u32>, second: Vec<u32>) -> Vec<u32> {
        let mut ids = Vec::with_capacity(first.len() + second.len() + 3);
        ids.push(self.cls_id);
        ids.extend(first);
        ids.push(self.sep_id);
        if !second.is_empty() {
            ids.extend(second);
            ids.push(self.sep_id);
        }
        ids
    }
}
