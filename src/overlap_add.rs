use std::{collections::VecDeque, iter::Fuse, ops::Add};

/// Flattens a stream of frames into one signal, starting each frame `hop`
/// samples after the previous one and summing where frames overlap.
pub trait OverlapAddExt: Iterator + Sized
where
    Self::Item: IntoIterator,
    <Self::Item as IntoIterator>::Item: Add<Output = <Self::Item as IntoIterator>::Item> + Copy + Default,
{
    fn overlap_add(self, hop: usize) -> OverlapAdd<Self> {
        OverlapAdd {
            frames: self.fuse(),
            hop: hop.max(1),
            pending: VecDeque::new(),
            ready: 0,
        }
    }
}

impl<I> OverlapAddExt for I
where
    I: Iterator,
    I::Item: IntoIterator,
    <I::Item as IntoIterator>::Item: Add<Output = <I::Item as IntoIterator>::Item> + Copy + Default,
{
}

pub struct OverlapAdd<I>
where
    I: Iterator,
    I::Item: IntoIterator,
{
    frames: Fuse<I>,
    hop: usize,
    // Samples from the start of the latest frame onwards.
    pending: VecDeque<<I::Item as IntoIterator>::Item>,
    // Leading samples of `pending` that no later frame can touch.
    ready: usize,
}

impl<I> Iterator for OverlapAdd<I>
where
    I: Iterator,
    I::Item: IntoIterator,
    <I::Item as IntoIterator>::Item: Add<Output = <I::Item as IntoIterator>::Item> + Copy + Default,
{
    type Item = <I::Item as IntoIterator>::Item;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.ready > 0 {
                self.ready -= 1;
                return self.pending.pop_front();
            }

            let Some(frame) = self.frames.next() else {
                return self.pending.pop_front();
            };

            let mut samples = frame.into_iter();
            for slot in self.pending.iter_mut() {
                let Some(x) = samples.next() else {
                    break;
                };
                *slot = *slot + x;
            }
            self.pending.extend(samples);
            if self.pending.len() < self.hop {
                self.pending.resize(self.hop, Default::default());
            }
            self.ready = self.hop;
        }
    }
}
