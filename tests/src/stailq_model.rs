use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use relq::queue::stailq::{StailqEntry, StailqHead, StailqLink};
use relq::RelIdx;

struct Node {
    link: StailqLink,
}

enum ByLink {}
impl StailqEntry<Node> for ByLink {
    fn link(elm: &Node) -> &StailqLink {
        &elm.link
    }
    fn link_mut(elm: &mut Node) -> &mut StailqLink {
        &mut elm.link
    }
}

type Head = StailqHead<Node, ByLink>;

fn arena(n: usize) -> Vec<Node> {
    (0..n)
        .map(|_| Node {
            link: StailqLink::new(),
        })
        .collect()
}

fn check(h: &Head, base: &[Node], model: &[u32]) {
    let fwd: Vec<u32> = h.iter(base).map(|i| i.raw()).collect();
    assert_eq!(fwd, model);
    assert_eq!(h.is_empty(), model.is_empty());
    assert_eq!(h.first().raw(), model.first().copied().unwrap_or(0));
    assert_eq!(h.last().raw(), model.last().copied().unwrap_or(0));
    if let Some(off) = h.last().offset() {
        assert!(base[off].link.next().is_nil());
    }
}

#[test]
fn randomized_against_model() {
    const CAP: usize = 512;
    const OPS: usize = 40_000;

    let mut rng = StdRng::seed_from_u64(0x57A1_0001);
    let mut base = arena(CAP);
    let mut h = Head::new();
    let mut model: Vec<u32> = Vec::new();
    let mut free: Vec<u32> = (1..=CAP as u32).collect();

    for op in 0..OPS {
        match rng.gen_range(0, 6) {
            0 => {
                if let Some(idx) = free.pop() {
                    h.insert_head(&mut base, RelIdx::new(idx));
                    model.insert(0, idx);
                }
            }
            1 => {
                if let Some(idx) = free.pop() {
                    h.insert_tail(&mut base, RelIdx::new(idx));
                    model.push(idx);
                }
            }
            2 => {
                if !model.is_empty() && !free.is_empty() {
                    let pos = rng.gen_range(0, model.len());
                    let at = model[pos];
                    let idx = free.pop().unwrap();
                    h.insert_after(&mut base, RelIdx::new(at), RelIdx::new(idx));
                    model.insert(pos + 1, idx);
                }
            }
            3 => {
                let removed = h.remove_head(&mut base);
                if !model.is_empty() {
                    assert_eq!(removed.raw(), model.remove(0));
                    free.push(removed.raw());
                } else {
                    assert!(removed.is_nil());
                }
            }
            4 => {
                if !model.is_empty() {
                    let pos = rng.gen_range(0, model.len());
                    let at = model[pos];
                    let removed = h.remove_after(&mut base, RelIdx::new(at));
                    if pos + 1 < model.len() {
                        assert_eq!(removed.raw(), model.remove(pos + 1));
                        free.push(removed.raw());
                    } else {
                        assert!(removed.is_nil());
                    }
                }
            }
            _ => {
                if !model.is_empty() {
                    let pos = rng.gen_range(0, model.len());
                    let idx = model.remove(pos);
                    h.remove(&mut base, RelIdx::new(idx));
                    free.push(idx);
                }
            }
        }

        if op % 32 == 0 {
            check(&h, &base, &model);
        }
    }
    check(&h, &base, &model);
}

#[test]
fn remove_head_until_matches_prefix_drop() {
    const CAP: usize = 64;
    let mut base = arena(CAP);
    let mut h = Head::new();
    let mut model: Vec<u32> = Vec::new();
    for idx in 1..=CAP as u32 {
        h.insert_tail(&mut base, RelIdx::new(idx));
        model.push(idx);
    }

    h.remove_head_until(&mut base, RelIdx::new(17));
    let model: Vec<u32> = model.split_off(17);
    check(&h, &base, &model);

    // dropping through the tail empties the queue
    h.remove_head_until(&mut base, RelIdx::new(CAP as u32));
    check(&h, &base, &[]);
}

#[test]
fn concat_swap_roundtrip() {
    const CAP: usize = 200;
    let mut rng = StdRng::seed_from_u64(0x57A1_0002);
    let mut base = arena(CAP);
    let mut a = Head::new();
    let mut b = Head::new();
    let mut ma: Vec<u32> = Vec::new();
    let mut mb: Vec<u32> = Vec::new();

    for idx in 1..=CAP as u32 {
        if rng.gen::<bool>() {
            a.insert_tail(&mut base, RelIdx::new(idx));
            ma.push(idx);
        } else {
            b.insert_tail(&mut base, RelIdx::new(idx));
            mb.push(idx);
        }
    }

    a.concat(&mut base, &mut b);
    ma.extend(mb.drain(..));
    check(&a, &base, &ma);
    check(&b, &base, &[]);

    StailqHead::swap(&mut a, &mut b);
    check(&a, &base, &[]);
    check(&b, &base, &ma);

    // concat of an empty source is a no-op
    b.concat(&mut base, &mut a);
    check(&b, &base, &ma);
}
